//! Build, test, lint, and command handlers.
//!
//! A failing build or a non-zero exit code is still `status: "executed"` —
//! the action ran; its outcome is data for the model. Only a missing
//! capability or an I/O failure is an error.

use taiga_core::types::{Action, ActionResult};

use crate::router::ActionRouter;

impl ActionRouter {
    pub(crate) async fn handle_build(&self, action: &Action) -> ActionResult {
        let Some(builder) = &self.builder else {
            return self.missing_capability(action, "Builder").await;
        };
        match builder.build(action.target.as_deref()).await {
            Ok(outcome) => {
                let message = if outcome.timed_out {
                    "build timed out".to_string()
                } else if outcome.success {
                    "build succeeded".to_string()
                } else {
                    format!("build failed (exit code {})", outcome.exit_code)
                };
                ActionResult::executed(action.kind(), message).with_outcome(outcome)
            }
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }

    pub(crate) async fn handle_run_tests(&self, action: &Action) -> ActionResult {
        let Some(tests) = &self.tests else {
            return self.missing_capability(action, "TestRunner").await;
        };
        match tests.run_tests(action.target.as_deref()).await {
            Ok(outcome) => {
                let message = if outcome.timed_out {
                    "tests timed out".to_string()
                } else {
                    format!("{} passed, {} failed", outcome.passed, outcome.failed)
                };
                ActionResult::executed(action.kind(), message).with_outcome(outcome)
            }
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }

    pub(crate) async fn handle_run_linter(&self, action: &Action) -> ActionResult {
        let Some(linter) = &self.linter else {
            return self.missing_capability(action, "LinterRunner").await;
        };
        match linter.lint(action.path.as_deref()).await {
            Ok(violations) => {
                let count = violations.len();
                let success = violations.is_empty();
                let message = if success {
                    "lint clean".to_string()
                } else {
                    format!("{count} lint violations")
                };
                ActionResult::executed(action.kind(), message)
                    .with("violations", violations)
                    .with("violation_count", count)
                    .with("success", success)
            }
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }

    pub(crate) async fn handle_run_command(&self, action: &Action) -> ActionResult {
        let Some(commands) = &self.commands else {
            return self.missing_capability(action, "CommandExecutor").await;
        };
        let command = action.command.as_deref().unwrap_or("");
        match commands.run(command).await {
            Ok(outcome) => {
                let message = if outcome.timed_out {
                    "command timed out".to_string()
                } else {
                    format!("command exited with code {}", outcome.exit_code)
                };
                ActionResult::executed(action.kind(), message).with_outcome(outcome)
            }
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }
}
