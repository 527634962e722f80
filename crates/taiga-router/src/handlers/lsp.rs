//! LSP query handlers.

use taiga_core::types::{Action, ActionKind, ActionResult};

use crate::router::ActionRouter;

impl ActionRouter {
    pub(crate) async fn handle_lsp(&self, kind: ActionKind, action: &Action) -> ActionResult {
        let Some(lsp) = &self.lsp else {
            return self.missing_capability(action, "LspOperator").await;
        };
        let symbol = action.symbol.as_deref().unwrap_or("");

        match kind {
            ActionKind::FindReferences => match lsp.find_references(symbol).await {
                Ok(references) => ActionResult::executed(
                    kind,
                    format!("{} references to {symbol}", references.len()),
                )
                .with("count", references.len())
                .with("references", references),
                Err(e) => ActionResult::error(kind, e.to_string()),
            },

            ActionKind::GoToDefinition => match lsp.go_to_definition(symbol).await {
                Ok(Some(location)) => ActionResult::executed(
                    kind,
                    format!("{symbol} is defined at {}:{}", location.file, location.line),
                )
                .with("found", true)
                .with("definition", location),
                Ok(None) => {
                    ActionResult::executed(kind, format!("no definition found for {symbol}"))
                        .with("found", false)
                }
                Err(e) => ActionResult::error(kind, e.to_string()),
            },

            ActionKind::FindImplementations => match lsp.find_implementations(symbol).await {
                Ok(implementations) => ActionResult::executed(
                    kind,
                    format!("{} implementations of {symbol}", implementations.len()),
                )
                .with("count", implementations.len())
                .with("implementations", implementations),
                Err(e) => ActionResult::error(kind, e.to_string()),
            },

            other => ActionResult::error(other, "not an LSP action"),
        }
    }
}
