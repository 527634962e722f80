//! Simplified single-action JSON surface.
//!
//! Small or local models struggle with the canonical `{"actions":[…]}` shape,
//! so the loop also accepts `{"action": "<verb>", …fields…}` with a short
//! verb vocabulary. Canonical input is detected and delegated to the strict
//! decoder, so callers can feed either form to this entry point.

use serde_json::{Map, Value};

use taiga_core::error::{EnvelopeError, ValidationError};
use taiga_core::types::{ActionEnvelope, ActionKind};

use crate::decode::decode_strict;
use crate::validate::validate_envelope;

/// Map a simplified verb to its action kind plus any implied fields.
///
/// Returns `(kind, implied_depth)`. Unlisted verbs fall back to the
/// canonical kind names so `{"action":"read_file"}` also works.
pub(crate) fn map_verb(verb: &str) -> Result<(ActionKind, Option<u32>), String> {
    let (kind, depth) = match verb {
        "scope" => (ActionKind::ReadTree, Some(2)),
        "tree" => (ActionKind::ReadTree, Some(3)),
        "read" => (ActionKind::ReadFile, None),
        "search" => (ActionKind::SearchText, None),
        "edit" => (ActionKind::EditCode, None),
        "write" => (ActionKind::WriteFile, None),
        "build" => (ActionKind::BuildProject, None),
        "test" => (ActionKind::RunTests, None),
        "bash" => (ActionKind::RunCommand, None),
        "escalate" => (ActionKind::EscalateCeo, None),
        other => (other.parse::<ActionKind>()?, None),
    };
    Ok((kind, depth))
}

/// Parse the simplified `{"action": "<verb>", …}` form into a single-action
/// envelope. Canonical `{"actions":[…]}` input is accepted too.
pub fn parse_simple(bytes: &[u8]) -> Result<ActionEnvelope, EnvelopeError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Json(e.to_string()))?;

    let Value::Object(mut obj) = value else {
        return Err(EnvelopeError::Json("expected a JSON object".into()));
    };

    // Canonical form sneaking in through the simple entry point.
    if obj.contains_key("actions") {
        return decode_strict(bytes);
    }

    let verb = match obj.remove("action") {
        Some(Value::String(v)) => v,
        Some(other) => {
            return Err(ValidationError::new(
                0,
                None,
                format!("`action` must be a string, got {other}"),
            )
            .into())
        }
        None => {
            return Err(ValidationError::new(0, None, "missing `action` verb").into());
        }
    };

    let (kind, implied_depth) =
        map_verb(&verb).map_err(|e| ValidationError::new(0, Some(verb.clone()), e))?;

    let notes = match obj.remove("notes") {
        Some(Value::String(n)) => Some(n),
        _ => None,
    };

    let mut action_obj = Map::new();
    action_obj.insert("type".into(), Value::String(kind.as_str().into()));
    if let Some(depth) = implied_depth {
        action_obj.insert("depth".into(), Value::from(depth));
    }
    for (k, v) in obj {
        action_obj.insert(k, v);
    }

    let action = serde_json::from_value(Value::Object(action_obj))
        .map_err(|e| ValidationError::new(0, Some(kind.as_str().into()), e.to_string()))?;

    let envelope = ActionEnvelope {
        actions: vec![action],
        notes,
    };
    validate_envelope(&envelope)?;
    Ok(envelope)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
