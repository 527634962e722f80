//! The action router.
//!
//! `execute` walks the envelope in order and turns every action into exactly
//! one [`ActionResult`]. Per-action failures are result values — the loop
//! never aborts on a handler error, only on cancellation (which returns the
//! partial list accumulated so far).

use std::sync::Arc;

use tracing::{info, warn};

use taiga_core::context::ActionContext;
use taiga_core::types::{
    Action, ActionEnvelope, ActionKind, ActionResult, BeadPriority, BeadType, NewBead,
};
use taiga_context::SharedContextStore;

use crate::cancel::CancelToken;
use crate::capability::{
    ActionLogger, BeadCloser, BeadCreator, BeadEscalator, Builder, CommandExecutor, FileManager,
    LinterRunner, LspOperator, MessageBus, PrReviewer, RefactorOperator, TestRunner,
    WorkflowOperator,
};
use crate::git_router::GitRouter;

/// Raw replies embedded in auto-filed beads are capped so a runaway model
/// cannot flood the tracker.
const MAX_EMBEDDED_REPLY: usize = 4_000;

// ---------------------------------------------------------------------------
// ActionRouter
// ---------------------------------------------------------------------------

/// Capability-injected action dispatcher.
///
/// Every capability is optional. Handlers check for presence: a missing
/// *mutating* capability files a bead describing the intended change (work
/// is not lost), a missing *query* capability reports `status: "error"`,
/// and workflow actions without a [`WorkflowOperator`] report
/// `status: "mcp_required"`.
#[derive(Default)]
pub struct ActionRouter {
    pub files: Option<Arc<dyn FileManager>>,
    pub commands: Option<Arc<dyn CommandExecutor>>,
    pub builder: Option<Arc<dyn Builder>>,
    pub tests: Option<Arc<dyn TestRunner>>,
    pub linter: Option<Arc<dyn LinterRunner>>,
    pub lsp: Option<Arc<dyn LspOperator>>,
    pub refactor: Option<Arc<dyn RefactorOperator>>,
    pub git: Option<Arc<dyn GitRouter>>,
    pub pr: Option<Arc<dyn PrReviewer>>,
    pub bead_creator: Option<Arc<dyn BeadCreator>>,
    pub bead_closer: Option<Arc<dyn BeadCloser>>,
    pub bead_escalator: Option<Arc<dyn BeadEscalator>>,
    pub workflow: Option<Arc<dyn WorkflowOperator>>,
    pub message_bus: Option<Arc<dyn MessageBus>>,
    pub shared_context: Option<Arc<SharedContextStore>>,
    pub logger: Option<Arc<dyn ActionLogger>>,
    /// Bead type used when a `create_bead` action does not name one.
    pub default_bead_type: BeadType,
    /// File beads as P0 (incident mode) when the action carries no priority.
    pub default_p0: bool,
}

impl ActionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute every action in order. One result per action, same order;
    /// cancellation lets the current handler finish, then returns the
    /// partial list.
    pub async fn execute(
        &self,
        cancel: &CancelToken,
        envelope: &ActionEnvelope,
        actx: &ActionContext,
    ) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(envelope.actions.len());

        for action in &envelope.actions {
            if cancel.is_cancelled() {
                warn!(
                    bead_id = %actx.bead_id,
                    completed = results.len(),
                    total = envelope.actions.len(),
                    "envelope cancelled, returning partial results"
                );
                break;
            }

            let result = self.dispatch(action, actx).await;
            info!(
                agent_id = %actx.agent_id,
                bead_id = %actx.bead_id,
                action = %result.action_type,
                status = ?result.status,
                "action executed"
            );
            if let Some(logger) = &self.logger {
                logger.log(actx, action, &result);
            }
            self.record_activity(actx, &result);
            results.push(result);
        }

        results
    }

    /// Route one action to its handler. Handlers never panic; anything that
    /// goes wrong becomes a `status: "error"` result.
    async fn dispatch(&self, action: &Action, actx: &ActionContext) -> ActionResult {
        let Some(kind) = action.kind else {
            // Validated envelopes always carry a kind; direct callers might
            // not.
            return ActionResult::error(ActionKind::Done, "action is missing its type");
        };

        match kind {
            // --- Inspection ---
            ActionKind::ReadFile => self.handle_read_file(action).await,
            ActionKind::ReadCode => self.handle_read_code(action).await,
            ActionKind::ReadTree => self.handle_read_tree(action).await,
            ActionKind::SearchText => self.handle_search_text(action).await,

            // --- Mutation ---
            ActionKind::WriteFile => self.handle_write_file(action).await,
            ActionKind::EditCode => self.handle_edit_code(action).await,
            ActionKind::ApplyPatch => self.handle_apply_patch(action).await,
            ActionKind::MoveFile | ActionKind::RenameFile => self.handle_rename(action).await,
            ActionKind::DeleteFile => self.handle_delete_file(action).await,

            // --- Build / run ---
            ActionKind::BuildProject => self.handle_build(action).await,
            ActionKind::RunTests => self.handle_run_tests(action).await,
            ActionKind::RunLinter => self.handle_run_linter(action).await,
            ActionKind::RunCommand => self.handle_run_command(action).await,

            // --- Git ---
            ActionKind::GitStatus
            | ActionKind::GitDiff
            | ActionKind::GitCommit
            | ActionKind::GitPush
            | ActionKind::CreatePr
            | ActionKind::GitMerge
            | ActionKind::GitRevert
            | ActionKind::BranchDelete
            | ActionKind::GitCheckout
            | ActionKind::GitLog
            | ActionKind::GitFetch
            | ActionKind::ListBranches
            | ActionKind::DiffBranches
            | ActionKind::BeadCommits => self.handle_git(kind, action, actx).await,

            // --- LSP ---
            ActionKind::FindReferences
            | ActionKind::GoToDefinition
            | ActionKind::FindImplementations => self.handle_lsp(kind, action).await,

            // --- Refactoring / debug ---
            ActionKind::ExtractMethod
            | ActionKind::RenameSymbol
            | ActionKind::InlineVariable
            | ActionKind::AddLog
            | ActionKind::AddBreakpoint
            | ActionKind::GenerateDocs => self.handle_refactor(kind, action).await,

            // --- Workflow ---
            ActionKind::StartDev
            | ActionKind::WhatsNext
            | ActionKind::ProceedToPhase
            | ActionKind::ConductReview
            | ActionKind::ResumeWorkflow
            | ActionKind::ApproveBead
            | ActionKind::RejectBead => self.handle_workflow(kind, action, actx).await,

            // --- PR review ---
            ActionKind::FetchPr
            | ActionKind::ReviewCode
            | ActionKind::AddPrComment
            | ActionKind::SubmitReview
            | ActionKind::RequestReview => self.handle_pr_review(kind, action).await,

            // --- Agent-to-agent ---
            ActionKind::SendAgentMessage => self.handle_send_message(action, actx).await,
            ActionKind::DelegateTask => self.handle_delegate(action, actx).await,

            // --- Control ---
            ActionKind::AskFollowup => self.handle_ask_followup(action),
            ActionKind::CreateBead => self.handle_create_bead(action, actx).await,
            ActionKind::CloseBead => self.handle_close_bead(action, actx).await,
            ActionKind::EscalateCeo => self.handle_escalate(action, actx).await,
            ActionKind::Done => self.handle_done(action),
        }
    }

    // -----------------------------------------------------------------------
    // Parse-failure recovery
    // -----------------------------------------------------------------------

    /// Turn a decode failure into a work item: file a bug bead embedding the
    /// error and the raw reply so the orchestrator surfaces the problem
    /// instead of crashing the loop.
    pub async fn auto_file_parse_failure(
        &self,
        err: &str,
        raw_reply: &str,
        actx: &ActionContext,
    ) -> ActionResult {
        let mut reply = raw_reply.to_string();
        if reply.len() > MAX_EMBEDDED_REPLY {
            let mut cut = MAX_EMBEDDED_REPLY;
            while !reply.is_char_boundary(cut) {
                cut -= 1;
            }
            reply.truncate(cut);
            reply.push_str("\n… (truncated)");
        }

        let description = format!(
            "The model reply for bead {} could not be parsed into actions.\n\n\
             Error: {err}\n\nRaw reply:\n```\n{reply}\n```",
            actx.bead_id
        );

        let Some(creator) = &self.bead_creator else {
            return ActionResult::error(
                ActionKind::CreateBead,
                format!("reply parse failed ({err}) and BeadCreator is not configured"),
            );
        };

        let bead = NewBead {
            title: format!("Model reply parse failure (agent {})", actx.agent_id),
            description,
            bead_type: BeadType::Bug,
            priority: self.default_priority(),
            project_id: actx.project_id.clone(),
        };

        match creator.create_bead(bead).await {
            Ok(bead_id) => {
                info!(bead_id = %bead_id, "auto-filed parse failure bead");
                ActionResult::executed(
                    ActionKind::CreateBead,
                    format!("filed parse-failure bead {bead_id}"),
                )
                .with("bead_id", bead_id)
            }
            Err(e) => ActionResult::error(
                ActionKind::CreateBead,
                format!("failed to file parse-failure bead: {e}"),
            ),
        }
    }

    // -----------------------------------------------------------------------
    // Shared handler helpers
    // -----------------------------------------------------------------------

    pub(crate) fn default_priority(&self) -> BeadPriority {
        if self.default_p0 {
            BeadPriority::P0
        } else {
            BeadPriority::P2
        }
    }

    /// Uniform treatment of an absent capability: mutations fall back to a
    /// bead so the intended change is not lost; queries report an error.
    /// Either way `action_type` stays the original kind.
    pub(crate) async fn missing_capability(
        &self,
        action: &Action,
        capability: &'static str,
    ) -> ActionResult {
        let kind = action.kind();
        if !kind.is_mutating() {
            return ActionResult::error(kind, format!("{capability} is not configured"));
        }

        let Some(creator) = &self.bead_creator else {
            return ActionResult::error(
                kind,
                format!("{capability} is not configured and no BeadCreator is available"),
            );
        };

        let intended = serde_json::to_string_pretty(action).unwrap_or_default();
        let bead = NewBead {
            title: format!("Apply deferred {kind} ({capability} offline)"),
            description: format!(
                "{capability} was not configured when the agent attempted this \
                 action. Intended action:\n```json\n{intended}\n```"
            ),
            bead_type: self.default_bead_type,
            priority: self.default_priority(),
            project_id: None,
        };

        match creator.create_bead(bead).await {
            Ok(bead_id) => ActionResult::executed(
                kind,
                format!("{capability} is offline; filed bead {bead_id} to carry the change"),
            )
            .with("bead_id", bead_id)
            .with("fallback", "create_bead"),
            Err(e) => ActionResult::error(
                kind,
                format!("{capability} is not configured and the fallback bead failed: {e}"),
            ),
        }
    }

    /// Best-effort activity trail into the shared bead context. Never
    /// affects the action outcome.
    fn record_activity(&self, actx: &ActionContext, result: &ActionResult) {
        let Some(store) = &self.shared_context else {
            return;
        };
        let _ = store.add_activity(
            &actx.bead_id,
            &actx.agent_id,
            "action",
            &format!("{}: {}", result.action_type, result.message),
            None,
        );
    }
}
