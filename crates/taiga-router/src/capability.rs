//! Capability traits consumed by the router.
//!
//! Every capability is a narrow interface with a small operation surface,
//! injected into the router as an `Option<Arc<dyn …>>`. Handlers check for
//! presence before dispatch — a missing mutating capability downgrades to a
//! bead-creation fallback, a missing query capability reports an error.
//! Implementations live with their owners (local process executor, git
//! adapter, orchestrator persistence); the router only knows these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use taiga_core::context::ActionContext;
use taiga_core::error::CapabilityError;
use taiga_core::types::{
    Action, ActionResult, AgentMessage, BuildOutcome, CommandOutcome, LintViolation, NewBead,
    ReferenceLocation, SearchMatch, TreeEntry,
};

pub type CapResult<T> = Result<T, CapabilityError>;

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Outcome of applying a unified diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchOutcome {
    pub applied: bool,
    pub output: String,
}

#[async_trait]
pub trait FileManager: Send + Sync {
    async fn read(&self, path: &str) -> CapResult<String>;
    /// Returns the number of bytes written.
    async fn write(&self, path: &str, content: &str) -> CapResult<usize>;
    async fn delete(&self, path: &str) -> CapResult<()>;
    async fn rename(&self, from: &str, to: &str) -> CapResult<()>;
    async fn list_tree(&self, path: Option<&str>, depth: u32) -> CapResult<Vec<TreeEntry>>;
    async fn search(&self, query: &str, path: Option<&str>) -> CapResult<Vec<SearchMatch>>;
    async fn apply_patch(&self, patch: &str) -> CapResult<PatchOutcome>;
}

// ---------------------------------------------------------------------------
// Processes
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, command: &str) -> CapResult<CommandOutcome>;
}

#[async_trait]
pub trait Builder: Send + Sync {
    async fn build(&self, target: Option<&str>) -> CapResult<BuildOutcome>;
}

#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run_tests(&self, target: Option<&str>) -> CapResult<BuildOutcome>;
}

#[async_trait]
pub trait LinterRunner: Send + Sync {
    async fn lint(&self, path: Option<&str>) -> CapResult<Vec<LintViolation>>;
}

// ---------------------------------------------------------------------------
// Language intelligence
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LspOperator: Send + Sync {
    async fn find_references(&self, symbol: &str) -> CapResult<Vec<ReferenceLocation>>;
    async fn go_to_definition(&self, symbol: &str) -> CapResult<Option<ReferenceLocation>>;
    async fn find_implementations(&self, symbol: &str) -> CapResult<Vec<ReferenceLocation>>;
}

/// Source-transforming operations (refactorings and instrumentation).
/// All of these are mutations: with no operator wired the router files a
/// bead describing the intended change.
#[async_trait]
pub trait RefactorOperator: Send + Sync {
    async fn extract_method(
        &self,
        path: &str,
        start_line: u32,
        end_line: u32,
        new_name: &str,
    ) -> CapResult<Value>;
    async fn rename_symbol(&self, symbol: &str, new_name: &str) -> CapResult<Value>;
    async fn inline_variable(&self, path: &str, symbol: &str) -> CapResult<Value>;
    async fn add_log(&self, path: &str, line: u32, message: &str) -> CapResult<Value>;
    async fn add_breakpoint(&self, path: &str, line: u32) -> CapResult<Value>;
    async fn generate_docs(&self, path: &str, symbol: Option<&str>) -> CapResult<Value>;
}

// ---------------------------------------------------------------------------
// Beads
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BeadCreator: Send + Sync {
    /// Persist a new bead and return its id.
    async fn create_bead(&self, bead: NewBead) -> CapResult<String>;
}

#[async_trait]
pub trait BeadCloser: Send + Sync {
    async fn close_bead(&self, bead_id: &str, summary: Option<&str>) -> CapResult<()>;
}

#[async_trait]
pub trait BeadEscalator: Send + Sync {
    async fn escalate(&self, bead_id: &str, reason: &str) -> CapResult<()>;
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// Out-of-band workflow engine. When this capability is absent the router
/// answers workflow actions with `status: "mcp_required"` so the caller
/// knows to route them to the external workflow service.
#[async_trait]
pub trait WorkflowOperator: Send + Sync {
    async fn start_dev(&self, bead_id: &str) -> CapResult<Value>;
    async fn whats_next(&self, bead_id: &str) -> CapResult<Value>;
    async fn proceed_to_phase(&self, bead_id: &str, phase: &str) -> CapResult<Value>;
    async fn conduct_review(&self, bead_id: &str) -> CapResult<Value>;
    async fn resume_workflow(&self, workflow_id: &str) -> CapResult<Value>;
    async fn approve_bead(&self, bead_id: &str) -> CapResult<Value>;
    async fn reject_bead(&self, bead_id: &str, reason: &str) -> CapResult<Value>;
}

// ---------------------------------------------------------------------------
// PR review
// ---------------------------------------------------------------------------

/// Pull-request host operations (fetch, review, comment). Separate from the
/// per-project git adapter: PR state lives on the forge, not in the
/// working tree.
#[async_trait]
pub trait PrReviewer: Send + Sync {
    async fn fetch_pr(&self, pr_number: u64) -> CapResult<Value>;
    async fn review_code(&self, pr_number: u64) -> CapResult<Value>;
    /// `position` is `(path, line)` for an inline comment, `None` for a
    /// general one.
    async fn add_comment(
        &self,
        pr_number: u64,
        body: &str,
        position: Option<(String, u32)>,
    ) -> CapResult<Value>;
    async fn submit_review(
        &self,
        pr_number: u64,
        event: ReviewEvent,
        body: Option<&str>,
    ) -> CapResult<Value>;
    async fn request_review(&self, pr_number: u64, reviewers: &[String]) -> CapResult<Value>;
}

/// GitHub-style review verdicts. `submit_review` validates the wire string
/// against this set before calling the capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewEvent {
    #[serde(rename = "APPROVE")]
    Approve,
    #[serde(rename = "REQUEST_CHANGES")]
    RequestChanges,
    #[serde(rename = "COMMENT")]
    Comment,
}

impl std::str::FromStr for ReviewEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVE" => Ok(ReviewEvent::Approve),
            "REQUEST_CHANGES" => Ok(ReviewEvent::RequestChanges),
            "COMMENT" => Ok(ReviewEvent::Comment),
            other => Err(format!(
                "invalid review_event \"{other}\" (expected APPROVE, REQUEST_CHANGES, or COMMENT)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Deliver a message; returns the message id.
    async fn send(&self, message: AgentMessage) -> CapResult<String>;
    /// Resolve a role name ("qa_reviewer") to a concrete agent id.
    async fn resolve_role(&self, role: &str) -> CapResult<Option<String>>;
}

// ---------------------------------------------------------------------------
// Observability
// ---------------------------------------------------------------------------

/// Sink for per-action audit records. Synchronous and infallible by design:
/// logging must never change the outcome of an action.
pub trait ActionLogger: Send + Sync {
    fn log(&self, actx: &ActionContext, action: &Action, result: &ActionResult);
}
