use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// The closed set of action kinds the router can execute.
///
/// Grouped the way handlers are grouped: inspection, mutation, build/run,
/// git, LSP, refactoring, debug, workflow, PR review, agent-to-agent, and
/// control. Unknown kinds are rejected at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    // --- Inspection ---
    ReadFile,
    ReadCode,
    ReadTree,
    SearchText,

    // --- Mutation ---
    WriteFile,
    EditCode,
    ApplyPatch,
    MoveFile,
    DeleteFile,
    RenameFile,

    // --- Build / run ---
    BuildProject,
    RunTests,
    RunLinter,
    RunCommand,

    // --- Git ---
    GitStatus,
    GitDiff,
    GitCommit,
    GitPush,
    CreatePr,
    GitMerge,
    GitRevert,
    BranchDelete,
    GitCheckout,
    GitLog,
    GitFetch,
    ListBranches,
    DiffBranches,
    BeadCommits,

    // --- LSP ---
    FindReferences,
    GoToDefinition,
    FindImplementations,

    // --- Refactoring ---
    ExtractMethod,
    RenameSymbol,
    InlineVariable,

    // --- Debug ---
    AddLog,
    AddBreakpoint,
    GenerateDocs,

    // --- Workflow ---
    StartDev,
    WhatsNext,
    ProceedToPhase,
    ConductReview,
    ResumeWorkflow,
    ApproveBead,
    RejectBead,

    // --- PR review ---
    FetchPr,
    ReviewCode,
    AddPrComment,
    SubmitReview,
    RequestReview,

    // --- Agent-to-agent ---
    SendAgentMessage,
    DelegateTask,

    // --- Control ---
    AskFollowup,
    CreateBead,
    CloseBead,
    EscalateCeo,
    Done,
}

impl ActionKind {
    /// Wire spelling of the kind (`snake_case`, matches the serde rename).
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ReadFile => "read_file",
            ActionKind::ReadCode => "read_code",
            ActionKind::ReadTree => "read_tree",
            ActionKind::SearchText => "search_text",
            ActionKind::WriteFile => "write_file",
            ActionKind::EditCode => "edit_code",
            ActionKind::ApplyPatch => "apply_patch",
            ActionKind::MoveFile => "move_file",
            ActionKind::DeleteFile => "delete_file",
            ActionKind::RenameFile => "rename_file",
            ActionKind::BuildProject => "build_project",
            ActionKind::RunTests => "run_tests",
            ActionKind::RunLinter => "run_linter",
            ActionKind::RunCommand => "run_command",
            ActionKind::GitStatus => "git_status",
            ActionKind::GitDiff => "git_diff",
            ActionKind::GitCommit => "git_commit",
            ActionKind::GitPush => "git_push",
            ActionKind::CreatePr => "create_pr",
            ActionKind::GitMerge => "git_merge",
            ActionKind::GitRevert => "git_revert",
            ActionKind::BranchDelete => "branch_delete",
            ActionKind::GitCheckout => "git_checkout",
            ActionKind::GitLog => "git_log",
            ActionKind::GitFetch => "git_fetch",
            ActionKind::ListBranches => "list_branches",
            ActionKind::DiffBranches => "diff_branches",
            ActionKind::BeadCommits => "bead_commits",
            ActionKind::FindReferences => "find_references",
            ActionKind::GoToDefinition => "go_to_definition",
            ActionKind::FindImplementations => "find_implementations",
            ActionKind::ExtractMethod => "extract_method",
            ActionKind::RenameSymbol => "rename_symbol",
            ActionKind::InlineVariable => "inline_variable",
            ActionKind::AddLog => "add_log",
            ActionKind::AddBreakpoint => "add_breakpoint",
            ActionKind::GenerateDocs => "generate_docs",
            ActionKind::StartDev => "start_dev",
            ActionKind::WhatsNext => "whats_next",
            ActionKind::ProceedToPhase => "proceed_to_phase",
            ActionKind::ConductReview => "conduct_review",
            ActionKind::ResumeWorkflow => "resume_workflow",
            ActionKind::ApproveBead => "approve_bead",
            ActionKind::RejectBead => "reject_bead",
            ActionKind::FetchPr => "fetch_pr",
            ActionKind::ReviewCode => "review_code",
            ActionKind::AddPrComment => "add_pr_comment",
            ActionKind::SubmitReview => "submit_review",
            ActionKind::RequestReview => "request_review",
            ActionKind::SendAgentMessage => "send_agent_message",
            ActionKind::DelegateTask => "delegate_task",
            ActionKind::AskFollowup => "ask_followup",
            ActionKind::CreateBead => "create_bead",
            ActionKind::CloseBead => "close_bead",
            ActionKind::EscalateCeo => "escalate_ceo",
            ActionKind::Done => "done",
        }
    }

    /// Kinds whose effect would be lost if silently skipped: file and git
    /// writes, refactorings, forge-side review actions, and agent messages.
    /// Used by the router to decide whether a missing capability downgrades
    /// to a bead-creation fallback (mutating) or a plain error (query).
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            ActionKind::WriteFile
                | ActionKind::EditCode
                | ActionKind::ApplyPatch
                | ActionKind::MoveFile
                | ActionKind::DeleteFile
                | ActionKind::RenameFile
                | ActionKind::GitCommit
                | ActionKind::GitPush
                | ActionKind::CreatePr
                | ActionKind::GitMerge
                | ActionKind::GitRevert
                | ActionKind::BranchDelete
                | ActionKind::GitCheckout
                | ActionKind::ExtractMethod
                | ActionKind::RenameSymbol
                | ActionKind::InlineVariable
                | ActionKind::AddLog
                | ActionKind::AddBreakpoint
                | ActionKind::GenerateDocs
                | ActionKind::AddPrComment
                | ActionKind::SubmitReview
                | ActionKind::RequestReview
                | ActionKind::SendAgentMessage
                | ActionKind::DelegateTask
        )
    }

    /// Workflow kinds that must be served by an out-of-band workflow service
    /// when no `WorkflowOperator` is wired (`status: "mcp_required"`).
    pub fn is_workflow(&self) -> bool {
        matches!(
            self,
            ActionKind::StartDev
                | ActionKind::WhatsNext
                | ActionKind::ProceedToPhase
                | ActionKind::ConductReview
                | ActionKind::ResumeWorkflow
        )
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| format!("unknown action type \"{s}\""))
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One typed instruction from a model reply.
///
/// Deliberately permissive: `type` selects the kind, every other field is
/// optional at decode time. Which fields are *required* per kind is enforced
/// by the envelope validator, so a sloppy model reply fails with a precise
/// message instead of an opaque serde error. Unknown fields are rejected so
/// the strict decoder stays strict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: Option<ActionKind>,

    // --- Files ---
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub old_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub patch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_line: Option<u32>,

    // --- Build / run ---
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub command: Option<String>,

    // --- Git ---
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub base_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub remote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub delete_remote: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub create: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub no_ff: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub shas: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reviewers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub draft: Option<bool>,

    // --- PR review ---
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pr_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub review_event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub review_body: Option<String>,

    // --- LSP / refactoring / debug ---
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub column: Option<u32>,

    // --- Workflow ---
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub workflow_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bead_id: Option<String>,

    // --- Agent-to-agent ---
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub to_agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub to_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message_type: Option<String>,

    // --- Control ---
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bead_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub priority: Option<String>,
}

impl Action {
    /// Bare action of a given kind; fields are filled by the builder helpers.
    pub fn of(kind: ActionKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// The kind, for actions that passed validation (which guarantees it).
    pub fn kind(&self) -> ActionKind {
        self.kind.unwrap_or(ActionKind::Done)
    }

    pub fn read_file(path: impl Into<String>) -> Self {
        let mut a = Self::of(ActionKind::ReadFile);
        a.path = Some(path.into());
        a
    }

    pub fn read_tree(depth: u32) -> Self {
        let mut a = Self::of(ActionKind::ReadTree);
        a.depth = Some(depth);
        a
    }

    pub fn write_file(path: impl Into<String>, content: impl Into<String>) -> Self {
        let mut a = Self::of(ActionKind::WriteFile);
        a.path = Some(path.into());
        a.content = Some(content.into());
        a
    }

    pub fn edit_code(
        path: impl Into<String>,
        old_text: impl Into<String>,
        new_text: impl Into<String>,
    ) -> Self {
        let mut a = Self::of(ActionKind::EditCode);
        a.path = Some(path.into());
        a.old_text = Some(old_text.into());
        a.new_text = Some(new_text.into());
        a
    }

    pub fn run_command(command: impl Into<String>) -> Self {
        let mut a = Self::of(ActionKind::RunCommand);
        a.command = Some(command.into());
        a
    }

    pub fn create_bead(title: impl Into<String>, description: impl Into<String>) -> Self {
        let mut a = Self::of(ActionKind::CreateBead);
        a.title = Some(title.into());
        a.description = Some(description.into());
        a
    }

    pub fn done() -> Self {
        Self::of(ActionKind::Done)
    }
}

// ---------------------------------------------------------------------------
// ActionEnvelope
// ---------------------------------------------------------------------------

/// The validated, ordered list of actions produced from one model reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionEnvelope {
    pub actions: Vec<Action>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<String>,
}

impl ActionEnvelope {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            notes: None,
        }
    }

    pub fn single(action: Action) -> Self {
        Self::new(vec![action])
    }
}

// ---------------------------------------------------------------------------
// ActionStatus / ActionResult
// ---------------------------------------------------------------------------

/// Outcome classification for one executed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Executed,
    Error,
    McpRequired,
}

/// Uniform result shape for every action the router executes.
///
/// `message` is a short human sentence; machine detail lives in `metadata`.
/// The metadata map is the serialization boundary — internally handlers build
/// typed outcome structs and erase them here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_type: ActionKind,
    pub status: ActionStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub metadata: Map<String, Value>,
}

impl ActionResult {
    pub fn executed(action_type: ActionKind, message: impl Into<String>) -> Self {
        Self {
            action_type,
            status: ActionStatus::Executed,
            message: message.into(),
            metadata: Map::new(),
        }
    }

    pub fn error(action_type: ActionKind, message: impl Into<String>) -> Self {
        Self {
            action_type,
            status: ActionStatus::Error,
            message: message.into(),
            metadata: Map::new(),
        }
    }

    pub fn mcp_required(action_type: ActionKind, message: impl Into<String>) -> Self {
        Self {
            action_type,
            status: ActionStatus::McpRequired,
            message: message.into(),
            metadata: Map::new(),
        }
    }

    /// Attach one metadata entry. Values that fail to serialize become null
    /// rather than aborting the result.
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let v = serde_json::to_value(value).unwrap_or(Value::Null);
        self.metadata.insert(key.into(), v);
        self
    }

    /// Merge every field of a typed outcome struct into the metadata map.
    pub fn with_outcome(mut self, outcome: impl Serialize) -> Self {
        if let Ok(Value::Object(map)) = serde_json::to_value(outcome) {
            self.metadata.extend(map);
        }
        self
    }

    pub fn is_executed(&self) -> bool {
        self.status == ActionStatus::Executed
    }
}

// ---------------------------------------------------------------------------
// Typed outcome structs (erased into ActionResult metadata)
// ---------------------------------------------------------------------------

/// Output of a completed (or timed out) shell command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command_id: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// Output of a build or test run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub success: bool,
    pub exit_code: i32,
    pub passed: u32,
    pub failed: u32,
    pub output: String,
    pub timed_out: bool,
}

/// One linter finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintViolation {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub rule: String,
    pub severity: String,
    pub message: String,
    pub linter: String,
}

/// One `search_text` hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub path: String,
    pub line: u32,
    pub text: String,
}

/// One `read_tree` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: TreeEntryType,
    pub depth: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeEntryType {
    File,
    Dir,
}

/// One LSP location (references, definitions, implementations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Beads (as seen by the action loop)
// ---------------------------------------------------------------------------

/// Bead classification used when the loop files work items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeadType {
    Bug,
    Task,
    Feature,
}

impl Default for BeadType {
    fn default() -> Self {
        BeadType::Task
    }
}

impl std::fmt::Display for BeadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BeadType::Bug => f.write_str("bug"),
            BeadType::Task => f.write_str("task"),
            BeadType::Feature => f.write_str("feature"),
        }
    }
}

impl std::str::FromStr for BeadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bug" => Ok(BeadType::Bug),
            "task" => Ok(BeadType::Task),
            "feature" => Ok(BeadType::Feature),
            other => Err(format!("unknown bead type \"{other}\"")),
        }
    }
}

/// Priority band for filed beads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BeadPriority {
    P0,
    P1,
    P2,
    P3,
}

impl Default for BeadPriority {
    fn default() -> Self {
        BeadPriority::P2
    }
}

impl std::fmt::Display for BeadPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BeadPriority::P0 => f.write_str("P0"),
            BeadPriority::P1 => f.write_str("P1"),
            BeadPriority::P2 => f.write_str("P2"),
            BeadPriority::P3 => f.write_str("P3"),
        }
    }
}

impl std::str::FromStr for BeadPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "P0" => Ok(BeadPriority::P0),
            "P1" => Ok(BeadPriority::P1),
            "P2" => Ok(BeadPriority::P2),
            "P3" => Ok(BeadPriority::P3),
            other => Err(format!("unknown priority \"{other}\"")),
        }
    }
}

/// Request to mint a new bead, handed to the `BeadCreator` capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBead {
    pub title: String,
    pub description: String,
    pub bead_type: BeadType,
    pub priority: BeadPriority,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub project_id: Option<crate::context::ProjectId>,
}

// ---------------------------------------------------------------------------
// Agent messaging
// ---------------------------------------------------------------------------

/// Classification for agent-to-agent messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Question,
    Delegation,
    Notification,
    Response,
    Coordination,
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "question" => Ok(MessageType::Question),
            "delegation" => Ok(MessageType::Delegation),
            "notification" => Ok(MessageType::Notification),
            "response" => Ok(MessageType::Response),
            "coordination" => Ok(MessageType::Coordination),
            other => Err(format!(
                "invalid message_type \"{other}\" (expected question, delegation, notification, response, or coordination)"
            )),
        }
    }
}

/// An agent-to-agent message handed to the `MessageBus` capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub from_agent_id: String,
    pub to_agent_id: String,
    pub message_type: MessageType,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bead_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
