//! Inspection and file-mutation handlers.

use taiga_core::types::{Action, ActionResult};

use crate::router::ActionRouter;

/// Default tree depth when the action does not carry one (the `scope` verb).
const DEFAULT_TREE_DEPTH: u32 = 2;

fn required<'a>(field: &'a Option<String>) -> &'a str {
    // The validator guarantees presence for required fields; an empty string
    // here means the action bypassed validation and will fail downstream
    // with a clear message.
    field.as_deref().unwrap_or("")
}

impl ActionRouter {
    pub(crate) async fn handle_read_file(&self, action: &Action) -> ActionResult {
        let Some(files) = &self.files else {
            return self.missing_capability(action, "FileManager").await;
        };
        let path = required(&action.path);
        match files.read(path).await {
            Ok(content) => {
                let size = content.len();
                ActionResult::executed(action.kind(), format!("read {path} ({size} bytes)"))
                    .with("path", path)
                    .with("content", content)
                    .with("size", size)
            }
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }

    /// `read_code` is `read_file` plus an optional line window.
    pub(crate) async fn handle_read_code(&self, action: &Action) -> ActionResult {
        let Some(files) = &self.files else {
            return self.missing_capability(action, "FileManager").await;
        };
        let path = required(&action.path);
        let content = match files.read(path).await {
            Ok(c) => c,
            Err(e) => return ActionResult::error(action.kind(), e.to_string()),
        };

        let windowed = match (action.start_line, action.end_line) {
            (None, None) => content,
            (start, end) => {
                let start = start.unwrap_or(1).max(1) as usize;
                let end = end.unwrap_or(u32::MAX) as usize;
                content
                    .lines()
                    .enumerate()
                    .filter(|(i, _)| {
                        let line = i + 1;
                        line >= start && line <= end
                    })
                    .map(|(_, l)| l)
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };

        let size = windowed.len();
        ActionResult::executed(action.kind(), format!("read {path} ({size} bytes)"))
            .with("path", path)
            .with("content", windowed)
            .with("size", size)
    }

    pub(crate) async fn handle_read_tree(&self, action: &Action) -> ActionResult {
        let Some(files) = &self.files else {
            return self.missing_capability(action, "FileManager").await;
        };
        let depth = action.depth.unwrap_or(DEFAULT_TREE_DEPTH);
        match files.list_tree(action.path.as_deref(), depth).await {
            Ok(entries) => ActionResult::executed(
                action.kind(),
                format!("listed {} entries (depth {depth})", entries.len()),
            )
            .with("count", entries.len())
            .with("entries", entries),
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }

    pub(crate) async fn handle_search_text(&self, action: &Action) -> ActionResult {
        let Some(files) = &self.files else {
            return self.missing_capability(action, "FileManager").await;
        };
        let query = required(&action.query);
        match files.search(query, action.path.as_deref()).await {
            Ok(matches) => ActionResult::executed(
                action.kind(),
                format!("{} matches for \"{query}\"", matches.len()),
            )
            .with("count", matches.len())
            .with("matches", matches),
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }

    pub(crate) async fn handle_write_file(&self, action: &Action) -> ActionResult {
        let Some(files) = &self.files else {
            return self.missing_capability(action, "FileManager").await;
        };
        let path = required(&action.path);
        let content = action.content.as_deref().unwrap_or("");
        match files.write(path, content).await {
            Ok(bytes_written) => ActionResult::executed(
                action.kind(),
                format!("wrote {bytes_written} bytes to {path}"),
            )
            .with("path", path)
            .with("bytes_written", bytes_written),
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }

    pub(crate) async fn handle_apply_patch(&self, action: &Action) -> ActionResult {
        let Some(files) = &self.files else {
            return self.missing_capability(action, "FileManager").await;
        };
        let patch = required(&action.patch);
        match files.apply_patch(patch).await {
            Ok(outcome) if outcome.applied => {
                ActionResult::executed(action.kind(), "patch applied").with_outcome(outcome)
            }
            Ok(outcome) => {
                ActionResult::error(action.kind(), "patch did not apply cleanly")
                    .with_outcome(outcome)
            }
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }

    /// `move_file` and `rename_file` share one implementation: both are a
    /// rename with parent-directory creation.
    pub(crate) async fn handle_rename(&self, action: &Action) -> ActionResult {
        let Some(files) = &self.files else {
            return self.missing_capability(action, "FileManager").await;
        };
        let from = required(&action.path);
        let to = required(&action.destination);
        match files.rename(from, to).await {
            Ok(()) => ActionResult::executed(action.kind(), format!("moved {from} to {to}"))
                .with("path", from)
                .with("destination", to),
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }

    pub(crate) async fn handle_delete_file(&self, action: &Action) -> ActionResult {
        let Some(files) = &self.files else {
            return self.missing_capability(action, "FileManager").await;
        };
        let path = required(&action.path);
        match files.delete(path).await {
            Ok(()) => {
                ActionResult::executed(action.kind(), format!("deleted {path}")).with("path", path)
            }
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }
}
