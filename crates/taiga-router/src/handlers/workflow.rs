//! Workflow handlers.
//!
//! The five phase-driving actions are served by an out-of-band workflow
//! engine. With no `WorkflowOperator` wired they answer
//! `status: "mcp_required"`, telling the caller to route the action to the
//! external workflow service instead.

use taiga_core::context::ActionContext;
use taiga_core::types::{Action, ActionKind, ActionResult};

use crate::router::ActionRouter;

impl ActionRouter {
    pub(crate) async fn handle_workflow(
        &self,
        kind: ActionKind,
        action: &Action,
        actx: &ActionContext,
    ) -> ActionResult {
        let bead_id = action.bead_id.as_deref().unwrap_or(&actx.bead_id);

        let Some(workflow) = &self.workflow else {
            if kind.is_workflow() {
                return ActionResult::mcp_required(
                    kind,
                    format!("{kind} must be handled by the workflow service"),
                );
            }
            return ActionResult::error(kind, "WorkflowOperator is not configured");
        };

        let outcome = match kind {
            ActionKind::StartDev => workflow.start_dev(bead_id).await,
            ActionKind::WhatsNext => workflow.whats_next(bead_id).await,
            ActionKind::ProceedToPhase => {
                workflow
                    .proceed_to_phase(bead_id, action.phase.as_deref().unwrap_or(""))
                    .await
            }
            ActionKind::ConductReview => workflow.conduct_review(bead_id).await,
            ActionKind::ResumeWorkflow => {
                workflow
                    .resume_workflow(action.workflow_id.as_deref().unwrap_or(""))
                    .await
            }
            ActionKind::ApproveBead => workflow.approve_bead(bead_id).await,
            ActionKind::RejectBead => {
                workflow
                    .reject_bead(bead_id, action.reason.as_deref().unwrap_or(""))
                    .await
            }
            other => return ActionResult::error(other, "not a workflow action"),
        };

        match outcome {
            Ok(result) => ActionResult::executed(kind, format!("{kind} completed"))
                .with("bead_id", bead_id)
                .with("result", result),
            Err(e) => ActionResult::error(kind, e.to_string()),
        }
    }
}
