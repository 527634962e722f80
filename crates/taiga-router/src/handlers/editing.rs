//! The `edit_code` handler: read, fuzzy-match, replace, write back.

use taiga_core::patch::apply_replacement;
use taiga_core::types::{Action, ActionResult};

use crate::router::ActionRouter;

impl ActionRouter {
    pub(crate) async fn handle_edit_code(&self, action: &Action) -> ActionResult {
        let Some(files) = &self.files else {
            return self.missing_capability(action, "FileManager").await;
        };
        let path = action.path.as_deref().unwrap_or("");

        // A unified-diff payload takes the patch path instead of the ladder.
        if let Some(patch) = action.patch.as_deref() {
            if action.old_text.is_none() {
                return match files.apply_patch(patch).await {
                    Ok(outcome) if outcome.applied => {
                        ActionResult::executed(action.kind(), format!("patched {path}"))
                            .with("path", path)
                            .with_outcome(outcome)
                    }
                    Ok(outcome) => ActionResult::error(
                        action.kind(),
                        format!("patch did not apply cleanly to {path}"),
                    )
                    .with_outcome(outcome),
                    Err(e) => ActionResult::error(action.kind(), e.to_string()),
                };
            }
        }

        let old_text = action.old_text.as_deref().unwrap_or("");
        let new_text = action.new_text.as_deref().unwrap_or("");

        let content = match files.read(path).await {
            Ok(c) => c,
            Err(e) => return ActionResult::error(action.kind(), e.to_string()),
        };

        let Some((updated, strategy)) = apply_replacement(&content, old_text, new_text) else {
            // The feedback formatter keys on this prefix to suggest a READ.
            return ActionResult::error(
                action.kind(),
                format!("OLD text not found in {path}"),
            )
            .with("path", path);
        };

        match files.write(path, &updated).await {
            Ok(_) => ActionResult::executed(
                action.kind(),
                format!("edited {path} (match: {strategy})"),
            )
            .with("path", path)
            .with("match_strategy", strategy.as_str()),
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }
}
