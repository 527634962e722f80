//! Refactoring and instrumentation handlers. All mutating: without a
//! `RefactorOperator` the router files a bead carrying the intended change.

use taiga_core::types::{Action, ActionKind, ActionResult};

use crate::router::ActionRouter;

impl ActionRouter {
    pub(crate) async fn handle_refactor(&self, kind: ActionKind, action: &Action) -> ActionResult {
        let Some(refactor) = &self.refactor else {
            return self.missing_capability(action, "RefactorOperator").await;
        };

        let path = action.path.as_deref().unwrap_or("");
        let symbol = action.symbol.as_deref().unwrap_or("");

        let outcome = match kind {
            ActionKind::ExtractMethod => {
                refactor
                    .extract_method(
                        path,
                        action.start_line.unwrap_or(0),
                        action.end_line.unwrap_or(0),
                        action.new_name.as_deref().unwrap_or(""),
                    )
                    .await
            }
            ActionKind::RenameSymbol => {
                refactor
                    .rename_symbol(symbol, action.new_name.as_deref().unwrap_or(""))
                    .await
            }
            ActionKind::InlineVariable => refactor.inline_variable(path, symbol).await,
            ActionKind::AddLog => {
                refactor
                    .add_log(
                        path,
                        action.line.unwrap_or(0),
                        action.message.as_deref().unwrap_or(""),
                    )
                    .await
            }
            ActionKind::AddBreakpoint => {
                refactor.add_breakpoint(path, action.line.unwrap_or(0)).await
            }
            ActionKind::GenerateDocs => {
                refactor.generate_docs(path, action.symbol.as_deref()).await
            }
            other => return ActionResult::error(other, "not a refactoring action"),
        };

        match outcome {
            Ok(result) => {
                ActionResult::executed(kind, format!("{kind} applied")).with("result", result)
            }
            Err(e) => ActionResult::error(kind, e.to_string()),
        }
    }
}
