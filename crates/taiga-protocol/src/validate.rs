//! Strict envelope validation.
//!
//! Decoding is deliberately permissive — every field is optional on the wire
//! — so this module is where the contract is enforced: each recognized kind
//! has an exhaustive required-field set, plus a handful of cross-field rules
//! that presence checks alone cannot express.

use taiga_core::error::ValidationError;
use taiga_core::types::{Action, ActionEnvelope, ActionKind};

/// Required fields per kind.
///
/// The match is exhaustive with no wildcard arm: adding an `ActionKind`
/// without deciding its required fields is a compile error, which is what
/// keeps the validator total over the closed set.
pub fn required_fields(kind: ActionKind) -> &'static [&'static str] {
    match kind {
        ActionKind::ReadFile => &["path"],
        ActionKind::ReadCode => &["path"],
        ActionKind::ReadTree => &[],
        ActionKind::SearchText => &["query"],
        ActionKind::WriteFile => &["path", "content"],
        ActionKind::EditCode => &["path"],
        ActionKind::ApplyPatch => &["patch"],
        ActionKind::MoveFile => &["path", "destination"],
        ActionKind::DeleteFile => &["path"],
        ActionKind::RenameFile => &["path", "destination"],
        ActionKind::BuildProject => &[],
        ActionKind::RunTests => &[],
        ActionKind::RunLinter => &[],
        ActionKind::RunCommand => &["command"],
        ActionKind::GitStatus => &[],
        ActionKind::GitDiff => &[],
        ActionKind::GitCommit => &["message"],
        ActionKind::GitPush => &[],
        ActionKind::CreatePr => &["title"],
        ActionKind::GitMerge => &["branch"],
        ActionKind::GitRevert => &[],
        ActionKind::BranchDelete => &["branch"],
        ActionKind::GitCheckout => &["branch"],
        ActionKind::GitLog => &[],
        ActionKind::GitFetch => &[],
        ActionKind::ListBranches => &[],
        ActionKind::DiffBranches => &["base_branch", "branch"],
        ActionKind::BeadCommits => &[],
        ActionKind::FindReferences => &["symbol"],
        ActionKind::GoToDefinition => &["symbol"],
        ActionKind::FindImplementations => &["symbol"],
        ActionKind::ExtractMethod => &["path", "start_line", "end_line", "new_name"],
        ActionKind::RenameSymbol => &["symbol", "new_name"],
        ActionKind::InlineVariable => &["path", "symbol"],
        ActionKind::AddLog => &["path", "line", "message"],
        ActionKind::AddBreakpoint => &["path", "line"],
        ActionKind::GenerateDocs => &["path"],
        ActionKind::StartDev => &[],
        ActionKind::WhatsNext => &[],
        ActionKind::ProceedToPhase => &["phase"],
        ActionKind::ConductReview => &[],
        ActionKind::ResumeWorkflow => &["workflow_id"],
        ActionKind::ApproveBead => &[],
        ActionKind::RejectBead => &["reason"],
        ActionKind::FetchPr => &["pr_number"],
        ActionKind::ReviewCode => &["pr_number"],
        ActionKind::AddPrComment => &["pr_number", "comment_body"],
        ActionKind::SubmitReview => &["pr_number", "review_event"],
        ActionKind::RequestReview => &["pr_number", "reviewers"],
        ActionKind::SendAgentMessage => &["message_type", "message"],
        ActionKind::DelegateTask => &["description"],
        ActionKind::AskFollowup => &["question"],
        ActionKind::CreateBead => &["title"],
        ActionKind::CloseBead => &[],
        ActionKind::EscalateCeo => &["reason"],
        ActionKind::Done => &[],
    }
}

/// Presence check by field name. String fields must be non-blank, list
/// fields non-empty, numeric fields merely present.
fn has_field(action: &Action, name: &str) -> bool {
    fn s(v: &Option<String>) -> bool {
        v.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    match name {
        "path" => s(&action.path),
        "destination" => s(&action.destination),
        "content" => action.content.is_some(),
        "old_text" => action.old_text.as_deref().is_some_and(|t| !t.is_empty()),
        "new_text" => action.new_text.is_some(),
        "patch" => s(&action.patch),
        "query" => s(&action.query),
        "command" => s(&action.command),
        "message" => s(&action.message),
        "branch" => s(&action.branch),
        "base_branch" => s(&action.base_branch),
        "title" => s(&action.title),
        "comment_path" => s(&action.comment_path),
        "comment_body" => s(&action.comment_body),
        "review_event" => s(&action.review_event),
        "symbol" => s(&action.symbol),
        "new_name" => s(&action.new_name),
        "phase" => s(&action.phase),
        "workflow_id" => s(&action.workflow_id),
        "to_agent_id" => s(&action.to_agent_id),
        "to_role" => s(&action.to_role),
        "message_type" => s(&action.message_type),
        "question" => s(&action.question),
        "description" => s(&action.description),
        "reason" => s(&action.reason),
        "sha" => s(&action.sha),
        "start_line" => action.start_line.is_some(),
        "end_line" => action.end_line.is_some(),
        "line" => action.line.is_some(),
        "pr_number" => action.pr_number.is_some(),
        "comment_line" => action.comment_line.is_some(),
        "reviewers" => action.reviewers.as_deref().is_some_and(|r| !r.is_empty()),
        "shas" => action.shas.as_deref().is_some_and(|r| !r.is_empty()),
        _ => false,
    }
}

/// Validate a single action at `index` within its envelope.
pub fn validate_action(action: &Action, index: usize) -> Result<(), ValidationError> {
    let Some(kind) = action.kind else {
        return Err(ValidationError::new(
            index,
            None,
            "missing required field `type`",
        ));
    };
    let kind_name = || Some(kind.as_str().to_string());

    for field in required_fields(kind) {
        if !has_field(action, field) {
            return Err(ValidationError::new(
                index,
                kind_name(),
                format!("missing required field `{field}`"),
            ));
        }
    }

    // Cross-field rules that presence checks cannot express.
    match kind {
        ActionKind::EditCode => {
            let has_pair = has_field(action, "old_text") && has_field(action, "new_text");
            let has_patch = has_field(action, "patch");
            if !has_pair && !has_patch {
                return Err(ValidationError::new(
                    index,
                    kind_name(),
                    "requires either `old_text` + `new_text` or `patch`",
                ));
            }
        }
        ActionKind::GitRevert => {
            if !has_field(action, "sha") && !has_field(action, "shas") {
                return Err(ValidationError::new(
                    index,
                    kind_name(),
                    "requires `sha` or a non-empty `shas` list",
                ));
            }
        }
        ActionKind::SendAgentMessage | ActionKind::DelegateTask => {
            if !has_field(action, "to_agent_id") && !has_field(action, "to_role") {
                return Err(ValidationError::new(
                    index,
                    kind_name(),
                    "requires a recipient: `to_agent_id` or `to_role`",
                ));
            }
        }
        ActionKind::AddPrComment => {
            // Inline comments need both the path and the line; one without
            // the other is ambiguous.
            if has_field(action, "comment_path") != action.comment_line.is_some() {
                return Err(ValidationError::new(
                    index,
                    kind_name(),
                    "inline comments require both `comment_path` and `comment_line`",
                ));
            }
        }
        _ => {}
    }

    Ok(())
}

/// Validate a full envelope: non-empty, every action valid.
pub fn validate_envelope(envelope: &ActionEnvelope) -> Result<(), ValidationError> {
    if envelope.actions.is_empty() {
        return Err(ValidationError::envelope("envelope contains no actions"));
    }
    for (i, action) in envelope.actions.iter().enumerate() {
        validate_action(action, i)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
