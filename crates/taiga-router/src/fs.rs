//! Local filesystem capability, sandboxed to a project root.
//!
//! Every path from a model reply is treated as hostile until proven
//! otherwise: absolute paths and `..` traversal are rejected before any
//! filesystem call, so an agent can never read or write outside the project
//! it was handed.

use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use taiga_core::error::CapabilityError;
use taiga_core::types::{SearchMatch, TreeEntry, TreeEntryType};

use crate::capability::{CapResult, FileManager, PatchOutcome};

/// Directories never worth walking or searching.
const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Cap on search hits so a one-character query cannot flood a result.
const MAX_SEARCH_MATCHES: usize = 200;

/// Project-rooted [`FileManager`].
pub struct LocalFileManager {
    root: PathBuf,
}

impl LocalFileManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a model-supplied path inside the project root. Rejects
    /// absolute paths and any `..` component.
    fn resolve(&self, path: &str) -> CapResult<PathBuf> {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            return Err(CapabilityError::op(format!(
                "path escapes project root: {path}"
            )));
        }
        for component in candidate.components() {
            if matches!(component, Component::ParentDir) {
                return Err(CapabilityError::op(format!(
                    "path escapes project root: {path}"
                )));
            }
        }
        Ok(self.root.join(candidate))
    }
}

fn not_found(path: &str) -> CapabilityError {
    CapabilityError::op(format!("no such file or directory: {path}"))
}

/// One directory level, sorted for stable walk order.
async fn read_dir_sorted(dir: &Path) -> CapResult<Vec<PathBuf>> {
    let mut children = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        children.push(entry.path());
    }
    children.sort();
    Ok(children)
}

#[async_trait]
impl FileManager for LocalFileManager {
    async fn read(&self, path: &str) -> CapResult<String> {
        let full = self.resolve(path)?;
        match tokio::fs::read_to_string(&full).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found(path)),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &str, content: &str) -> CapResult<usize> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        Ok(content.len())
    }

    async fn delete(&self, path: &str) -> CapResult<()> {
        let full = self.resolve(path)?;
        let meta = match tokio::fs::metadata(&full).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found(path)),
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            tokio::fs::remove_dir_all(&full).await?;
        } else {
            tokio::fs::remove_file(&full).await?;
        }
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> CapResult<()> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        if tokio::fs::metadata(&src).await.is_err() {
            return Err(not_found(from));
        }
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&src, &dst).await?;
        Ok(())
    }

    async fn list_tree(&self, path: Option<&str>, depth: u32) -> CapResult<Vec<TreeEntry>> {
        let start = match path {
            Some(p) => self.resolve(p)?,
            None => self.root.clone(),
        };
        if tokio::fs::metadata(&start).await.is_err() {
            return Err(not_found(path.unwrap_or(".")));
        }

        let mut entries = Vec::new();
        let mut queue: VecDeque<(PathBuf, u32)> = VecDeque::new();
        queue.push_back((start, 0));

        while let Some((dir, level)) = queue.pop_front() {
            if level >= depth {
                continue;
            }
            let children = read_dir_sorted(&dir).await?;

            for child in children {
                let name = child
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                if name.starts_with('.') || SKIP_DIRS.contains(&name.as_str()) {
                    continue;
                }
                let rel = child
                    .strip_prefix(&self.root)
                    .unwrap_or(&child)
                    .to_string_lossy()
                    .to_string();
                let is_dir = tokio::fs::metadata(&child)
                    .await
                    .map(|m| m.is_dir())
                    .unwrap_or(false);
                entries.push(TreeEntry {
                    path: rel,
                    entry_type: if is_dir {
                        TreeEntryType::Dir
                    } else {
                        TreeEntryType::File
                    },
                    depth: level + 1,
                });
                if is_dir {
                    queue.push_back((child, level + 1));
                }
            }
        }
        Ok(entries)
    }

    async fn search(&self, query: &str, path: Option<&str>) -> CapResult<Vec<SearchMatch>> {
        let start = match path {
            Some(p) => self.resolve(p)?,
            None => self.root.clone(),
        };
        if tokio::fs::metadata(&start).await.is_err() {
            return Err(not_found(path.unwrap_or(".")));
        }

        let mut matches = Vec::new();
        let mut queue: VecDeque<PathBuf> = VecDeque::new();
        queue.push_back(start);

        'walk: while let Some(dir) = queue.pop_front() {
            let children = read_dir_sorted(&dir).await?;

            for child in children {
                let name = child
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                if name.starts_with('.') || SKIP_DIRS.contains(&name.as_str()) {
                    continue;
                }
                let is_dir = tokio::fs::metadata(&child)
                    .await
                    .map(|m| m.is_dir())
                    .unwrap_or(false);
                if is_dir {
                    queue.push_back(child);
                    continue;
                }
                // Binary files do not read as UTF-8; skip them silently.
                let Ok(text) = tokio::fs::read_to_string(&child).await else {
                    continue;
                };
                let rel = child
                    .strip_prefix(&self.root)
                    .unwrap_or(&child)
                    .to_string_lossy()
                    .to_string();
                for (lineno, line) in text.lines().enumerate() {
                    if line.contains(query) {
                        matches.push(SearchMatch {
                            path: rel.clone(),
                            line: lineno as u32 + 1,
                            text: line.trim_end().to_string(),
                        });
                        if matches.len() >= MAX_SEARCH_MATCHES {
                            break 'walk;
                        }
                    }
                }
            }
        }
        Ok(matches)
    }

    async fn apply_patch(&self, patch: &str) -> CapResult<PatchOutcome> {
        use std::process::Stdio;
        use tokio::io::AsyncWriteExt;

        let mut child = tokio::process::Command::new("git")
            .args(["apply", "--verbose", "-"])
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(patch.as_bytes()).await?;
        }
        let output = child.wait_with_output().await?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(PatchOutcome {
            applied: output.status.success(),
            output: text.trim().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, LocalFileManager) {
        let dir = tempfile::tempdir().unwrap();
        let fm = LocalFileManager::new(dir.path());
        (dir, fm)
    }

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let (_dir, fm) = manager();
        let written = fm.write("src/lib.rs", "pub fn f() {}\n").await.unwrap();
        assert_eq!(written, 14);
        let text = fm.read("src/lib.rs").await.unwrap();
        assert_eq!(text, "pub fn f() {}\n");
    }

    #[tokio::test]
    async fn read_missing_file_names_the_path() {
        let (_dir, fm) = manager();
        let err = fm.read("ghost.rs").await.unwrap_err();
        assert!(err.to_string().contains("no such file or directory"));
        assert!(err.to_string().contains("ghost.rs"));
    }

    #[tokio::test]
    async fn absolute_path_is_rejected() {
        let (_dir, fm) = manager();
        let err = fm.read("/etc/passwd").await.unwrap_err();
        assert!(err.to_string().contains("escapes project root"));
    }

    #[tokio::test]
    async fn parent_traversal_is_rejected() {
        let (_dir, fm) = manager();
        let err = fm.write("../outside.txt", "x").await.unwrap_err();
        assert!(err.to_string().contains("escapes project root"));
    }

    #[tokio::test]
    async fn rename_moves_the_file() {
        let (_dir, fm) = manager();
        fm.write("a.txt", "content").await.unwrap();
        fm.rename("a.txt", "nested/b.txt").await.unwrap();
        assert!(fm.read("a.txt").await.is_err());
        assert_eq!(fm.read("nested/b.txt").await.unwrap(), "content");
    }

    #[tokio::test]
    async fn delete_removes_files_and_dirs() {
        let (_dir, fm) = manager();
        fm.write("d/x.txt", "1").await.unwrap();
        fm.delete("d").await.unwrap();
        assert!(fm.read("d/x.txt").await.is_err());
        assert!(fm.delete("d").await.is_err());
    }

    #[tokio::test]
    async fn list_tree_honors_depth_and_skips_hidden() {
        let (_dir, fm) = manager();
        fm.write("src/lib.rs", "x").await.unwrap();
        fm.write("src/deep/inner.rs", "x").await.unwrap();
        fm.write(".hidden/secret.txt", "x").await.unwrap();

        let depth1 = fm.list_tree(None, 1).await.unwrap();
        let paths: Vec<&str> = depth1.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"src"));
        assert!(!paths.iter().any(|p| p.contains("hidden")));
        assert!(!paths.contains(&"src/lib.rs"));

        let depth2 = fm.list_tree(None, 2).await.unwrap();
        let paths: Vec<&str> = depth2.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"src/lib.rs"));
        assert!(paths.contains(&"src/deep"));
        assert!(!paths.contains(&"src/deep/inner.rs"));
    }

    #[tokio::test]
    async fn tree_entries_carry_type_and_depth() {
        let (_dir, fm) = manager();
        fm.write("src/lib.rs", "x").await.unwrap();
        let entries = fm.list_tree(None, 2).await.unwrap();
        let dir_entry = entries.iter().find(|e| e.path == "src").unwrap();
        assert_eq!(dir_entry.entry_type, TreeEntryType::Dir);
        assert_eq!(dir_entry.depth, 1);
        let file_entry = entries.iter().find(|e| e.path == "src/lib.rs").unwrap();
        assert_eq!(file_entry.entry_type, TreeEntryType::File);
        assert_eq!(file_entry.depth, 2);
    }

    #[tokio::test]
    async fn search_finds_lines_with_positions() {
        let (_dir, fm) = manager();
        fm.write("src/a.rs", "fn alpha() {}\nfn beta() {}\n")
            .await
            .unwrap();
        fm.write("src/b.rs", "// beta mentioned here\n").await.unwrap();

        let hits = fm.search("beta", None).await.unwrap();
        assert_eq!(hits.len(), 2);
        let a_hit = hits.iter().find(|h| h.path == "src/a.rs").unwrap();
        assert_eq!(a_hit.line, 2);
        assert_eq!(a_hit.text, "fn beta() {}");
    }

    #[tokio::test]
    async fn search_scoped_to_subdirectory() {
        let (_dir, fm) = manager();
        fm.write("src/a.rs", "needle\n").await.unwrap();
        fm.write("docs/readme.md", "needle\n").await.unwrap();
        let hits = fm.search("needle", Some("docs")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "docs/readme.md");
    }
}
