//! Line-oriented text fallback.
//!
//! For models that cannot reliably emit JSON the loop accepts:
//!
//! ```text
//! ACTION: EDIT src/main.rs
//! <<<
//! old text
//! >>>
//! <<<
//! new text
//! >>>
//! ```
//!
//! One action per reply. When several `ACTION:` lines appear, the **first**
//! one wins and the rest are ignored — later lines are usually the model
//! re-narrating its plan.

use taiga_core::error::{EnvelopeError, ValidationError};
use taiga_core::types::{Action, ActionEnvelope, ActionKind};

use crate::simple::map_verb;
use crate::validate::validate_envelope;

/// Parse a text-form reply into a single-action envelope.
pub fn parse_text(input: &str) -> Result<ActionEnvelope, EnvelopeError> {
    let mut lines = input.lines();

    let (verb, arg) = loop {
        let Some(line) = lines.next() else {
            return Err(EnvelopeError::NoAction);
        };
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("ACTION:") {
            let rest = rest.trim();
            let (verb, arg) = match rest.split_once(char::is_whitespace) {
                Some((v, a)) => (v, a.trim()),
                None => (rest, ""),
            };
            if verb.is_empty() {
                return Err(ValidationError::new(0, None, "empty ACTION verb").into());
            }
            break (verb.to_ascii_lowercase(), arg.to_string());
        }
    };

    // Collect fenced bodies after the ACTION line.
    let mut bodies: Vec<String> = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for line in lines {
        match (line.trim(), &mut current) {
            ("<<<", None) => current = Some(Vec::new()),
            (">>>", Some(_)) => {
                if let Some(body) = current.take() {
                    bodies.push(body.join("\n"));
                }
            }
            (_, Some(body)) => body.push(line),
            (_, None) => {}
        }
    }

    let (kind, implied_depth) =
        map_verb(&verb).map_err(|e| ValidationError::new(0, Some(verb.clone()), e))?;

    let action = build_action(kind, implied_depth, &arg, &bodies);
    let envelope = ActionEnvelope::single(action);
    validate_envelope(&envelope)?;
    Ok(envelope)
}

/// Assign the positional argument and fenced bodies to the fields the kind
/// expects. Anything the text form cannot express is left unset and caught
/// by the validator.
fn build_action(
    kind: ActionKind,
    implied_depth: Option<u32>,
    arg: &str,
    bodies: &[String],
) -> Action {
    let mut action = Action::of(kind);
    let arg_opt = (!arg.is_empty()).then(|| arg.to_string());
    let first_body = bodies.first().cloned();
    let second_body = bodies.get(1).cloned();

    match kind {
        ActionKind::ReadFile
        | ActionKind::ReadCode
        | ActionKind::DeleteFile
        | ActionKind::GenerateDocs => action.path = arg_opt,
        ActionKind::ReadTree => {
            action.depth = arg.parse::<u32>().ok().or(implied_depth);
        }
        ActionKind::SearchText => action.query = arg_opt.or(first_body),
        ActionKind::EditCode => {
            action.path = arg_opt;
            action.old_text = first_body;
            action.new_text = second_body;
        }
        ActionKind::WriteFile => {
            action.path = arg_opt;
            action.content = first_body;
        }
        ActionKind::ApplyPatch => {
            action.path = arg_opt;
            action.patch = first_body;
        }
        ActionKind::RunCommand => action.command = arg_opt.or(first_body),
        ActionKind::BuildProject | ActionKind::RunTests | ActionKind::RunLinter => {
            action.target = arg_opt;
        }
        ActionKind::GitCommit => action.message = arg_opt.or(first_body),
        ActionKind::EscalateCeo => action.reason = arg_opt.or(first_body),
        ActionKind::CreateBead => {
            action.title = arg_opt;
            action.description = first_body;
        }
        ActionKind::Done => action.summary = arg_opt.or(first_body),
        _ => {}
    }

    action
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
