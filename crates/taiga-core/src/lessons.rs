//! Per-project lessons persistence.
//!
//! Agents accumulate short "what went wrong / what worked" entries in a
//! markdown file inside the project. The file is append-only from the loop's
//! perspective; read-back is capped so a long-lived project cannot blow up
//! the prompt budget.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::LessonsError;

/// Marker appended when a capped read drops content.
const TRUNCATION_MARKER: &str = "(truncated)";

/// Handle to one project's lessons markdown file.
#[derive(Debug, Clone)]
pub struct LessonsFile {
    path: PathBuf,
    max_read_bytes: usize,
}

impl LessonsFile {
    pub fn new(path: impl Into<PathBuf>, max_read_bytes: usize) -> Self {
        Self {
            path: path.into(),
            max_read_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry:
    ///
    /// ```markdown
    /// ## BUILD: Feature tests need the fixtures crate
    /// - cargo test fails without `--features fixtures`
    /// - bead=bead-12 agent=crew-1
    /// ```
    pub fn append(
        &self,
        category: &str,
        title: &str,
        details: &[String],
        bead_id: &str,
        agent_id: &str,
    ) -> Result<(), LessonsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut entry = format!("## {}: {}\n", category.to_uppercase(), title);
        for detail in details {
            entry.push_str(&format!("- {detail}\n"));
        }
        entry.push_str(&format!("- bead={bead_id} agent={agent_id}\n\n"));

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.as_bytes())?;
        Ok(())
    }

    /// Read the file back, truncated to the byte cap at a line boundary.
    ///
    /// A missing file reads as empty — a fresh project simply has no lessons
    /// yet.
    pub fn read_capped(&self) -> Result<String, LessonsError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
            Err(e) => return Err(e.into()),
        };

        if text.len() <= self.max_read_bytes {
            return Ok(text);
        }

        // Cut at the last line boundary inside the cap, then mark the cut.
        let mut cap = self.max_read_bytes.min(text.len());
        while !text.is_char_boundary(cap) {
            cap -= 1;
        }
        let cut = text[..cap].rfind('\n').map(|i| i + 1).unwrap_or(cap);
        let mut out = text[..cut].to_string();
        out.push_str(TRUNCATION_MARKER);
        out.push('\n');
        Ok(out)
    }
}
