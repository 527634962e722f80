//! Control-flow handlers: followups, bead lifecycle, completion.

use taiga_core::context::ActionContext;
use taiga_core::types::{Action, ActionResult, NewBead};

use crate::router::ActionRouter;

impl ActionRouter {
    /// The question is surfaced to the operator by the orchestrator; the
    /// loop just records it.
    pub(crate) fn handle_ask_followup(&self, action: &Action) -> ActionResult {
        let question = action.question.as_deref().unwrap_or("");
        ActionResult::executed(action.kind(), "question recorded for the operator")
            .with("question", question)
    }

    pub(crate) async fn handle_create_bead(
        &self,
        action: &Action,
        actx: &ActionContext,
    ) -> ActionResult {
        let Some(creator) = &self.bead_creator else {
            return ActionResult::error(action.kind(), "BeadCreator is not configured");
        };

        let bead_type = action
            .bead_type
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(self.default_bead_type);
        let priority = action
            .priority
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(|| self.default_priority());

        let bead = NewBead {
            title: action.title.clone().unwrap_or_default(),
            description: action.description.clone().unwrap_or_default(),
            bead_type,
            priority,
            project_id: actx.project_id.clone(),
        };

        match creator.create_bead(bead).await {
            Ok(bead_id) => ActionResult::executed(
                action.kind(),
                format!("created {bead_type} bead {bead_id}"),
            )
            .with("bead_id", bead_id),
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }

    pub(crate) async fn handle_close_bead(
        &self,
        action: &Action,
        actx: &ActionContext,
    ) -> ActionResult {
        let Some(closer) = &self.bead_closer else {
            return ActionResult::error(action.kind(), "BeadCloser is not configured");
        };
        let bead_id = action.bead_id.as_deref().unwrap_or(&actx.bead_id);
        match closer.close_bead(bead_id, action.summary.as_deref()).await {
            Ok(()) => ActionResult::executed(action.kind(), format!("closed bead {bead_id}"))
                .with("bead_id", bead_id),
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }

    pub(crate) async fn handle_escalate(
        &self,
        action: &Action,
        actx: &ActionContext,
    ) -> ActionResult {
        let Some(escalator) = &self.bead_escalator else {
            return ActionResult::error(action.kind(), "BeadEscalator is not configured");
        };
        let bead_id = action.bead_id.as_deref().unwrap_or(&actx.bead_id);
        let reason = action.reason.as_deref().unwrap_or("");
        match escalator.escalate(bead_id, reason).await {
            Ok(()) => ActionResult::executed(
                action.kind(),
                format!("escalated bead {bead_id} to the CEO agent"),
            )
            .with("bead_id", bead_id)
            .with("reason", reason),
            Err(e) => ActionResult::error(action.kind(), e.to_string()),
        }
    }

    pub(crate) fn handle_done(&self, action: &Action) -> ActionResult {
        let mut result = ActionResult::executed(action.kind(), "Task marked complete.");
        if let Some(summary) = &action.summary {
            result = result.with("summary", summary);
        }
        result
    }
}
