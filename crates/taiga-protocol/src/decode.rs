//! Strict and lenient envelope decoding.
//!
//! `decode_strict` is a pure function over its input: exact JSON, unknown
//! fields rejected, trailing tokens rejected, then validated. The lenient
//! path runs a cleanup pipeline over the raw reply and retries strictly
//! exactly once, so lenient decoding of already-canonical input is identical
//! to strict decoding.

use serde::Deserialize;
use serde_json::Value;

use taiga_core::error::{EnvelopeError, ValidationError};
use taiga_core::types::{Action, ActionEnvelope};

use crate::validate::validate_envelope;

/// Raw wire shape before per-action decoding. Keeping the actions as plain
/// values lets a bad element report its index instead of failing the whole
/// list opaquely.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnvelope {
    actions: Vec<Value>,
    #[serde(default)]
    notes: Option<String>,
}

/// Decode exact JSON into a validated envelope.
pub fn decode_strict(bytes: &[u8]) -> Result<ActionEnvelope, EnvelopeError> {
    let raw: RawEnvelope =
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Json(e.to_string()))?;

    let mut actions = Vec::with_capacity(raw.actions.len());
    for (i, value) in raw.actions.into_iter().enumerate() {
        let kind_hint = value
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string);
        let action: Action = serde_json::from_value(value)
            .map_err(|e| ValidationError::new(i, kind_hint, e.to_string()))?;
        actions.push(action);
    }

    let envelope = ActionEnvelope {
        actions,
        notes: raw.notes,
    };
    validate_envelope(&envelope)?;
    Ok(envelope)
}

/// Decode with cleanup: strict first; on failure strip fences and thinking
/// tags, extract the first balanced JSON payload, and retry strictly once.
pub fn decode_lenient(bytes: &[u8]) -> Result<ActionEnvelope, EnvelopeError> {
    match decode_strict(bytes) {
        Ok(env) => Ok(env),
        Err(first_err) => {
            let text = String::from_utf8_lossy(bytes);
            let cleaned = cleanup(&text);
            if cleaned.as_bytes() == bytes {
                return Err(first_err);
            }
            decode_strict(cleaned.as_bytes())
        }
    }
}

// ---------------------------------------------------------------------------
// Cleanup pipeline
// ---------------------------------------------------------------------------

/// Full cleanup pipeline: fences, then think tags, then JSON extraction.
pub fn cleanup(text: &str) -> String {
    let no_fences = strip_code_fences(text);
    let no_thinking = strip_think_tags(&no_fences);
    extract_first_json(&no_thinking).unwrap_or(no_thinking)
}

/// Strip a markdown code fence, keeping only its contents. The language tag
/// on the opening fence line is discarded; an unclosed fence keeps
/// everything after the opener.
pub fn strip_code_fences(text: &str) -> String {
    let Some(open) = text.find("```") else {
        return text.to_string();
    };
    let after_marker = &text[open + 3..];
    // Skip the language tag (rest of the opening line).
    let body = match after_marker.find('\n') {
        Some(nl) => &after_marker[nl + 1..],
        None => return text.to_string(),
    };
    match body.find("```") {
        Some(close) => body[..close].to_string(),
        None => body.to_string(),
    }
}

const THINK_TAGS: &[(&str, &str)] = &[
    ("<thinking>", "</thinking>"),
    ("<think>", "</think>"),
    ("<reasoning>", "</reasoning>"),
];

/// Remove model "thinking" spans.
///
/// Paired tags are removed with their contents. An opening tag with no
/// closer discards through end of input; a closing tag with no opener
/// discards everything before it (common when the opener was emitted in a
/// previous chunk).
pub fn strip_think_tags(text: &str) -> String {
    let mut out = text.to_string();
    for (open_tag, close_tag) in THINK_TAGS {
        loop {
            match (out.find(open_tag), out.find(close_tag)) {
                (Some(open), Some(close)) if open < close => {
                    out.replace_range(open..close + close_tag.len(), "");
                }
                (Some(open), None) => {
                    out.truncate(open);
                    break;
                }
                (None, Some(close)) | (Some(_), Some(close)) => {
                    // Closer with no opener before it.
                    out.replace_range(..close + close_tag.len(), "");
                }
                (None, None) => break,
            }
        }
    }
    out
}

/// Extract the first well-formed JSON object from the text by brace matching
/// that honors string escaping; falls back to the first well-formed array
/// when no object can be extracted.
pub fn extract_first_json(text: &str) -> Option<String> {
    extract_balanced(text, '{', '}').or_else(|| extract_balanced(text, '[', ']'))
}

fn extract_balanced(text: &str, open: char, close: char) -> Option<String> {
    let bytes = text.as_bytes();
    let mut start = 0usize;
    while let Some(rel) = text[start..].find(open) {
        let begin = start + rel;
        if let Some(end) = scan_balanced(bytes, begin, open as u8, close as u8) {
            return Some(text[begin..=end].to_string());
        }
        start = begin + 1;
    }
    None
}

/// Scan from `begin` (which holds `open`) to the matching `close`, honoring
/// strings and escapes. Returns the index of the closing byte.
fn scan_balanced(bytes: &[u8], begin: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(begin) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            _ if in_string => {}
            b if b == open => depth += 1,
            b if b == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use taiga_core::types::ActionKind;

    #[test]
    fn strict_decodes_canonical_envelope() {
        let env = decode_strict(br#"{"actions":[{"type":"done"}],"notes":"fin"}"#).unwrap();
        assert_eq!(env.actions.len(), 1);
        assert_eq!(env.actions[0].kind, Some(ActionKind::Done));
        assert_eq!(env.notes.as_deref(), Some("fin"));
    }

    #[test]
    fn strict_rejects_trailing_tokens() {
        let err = decode_strict(br#"{"actions":[{"type":"done"}]} trailing"#);
        assert!(matches!(err, Err(EnvelopeError::Json(_))));
    }

    #[test]
    fn strict_rejects_unknown_envelope_fields() {
        let err = decode_strict(br#"{"actions":[{"type":"done"}],"extra":1}"#);
        assert!(matches!(err, Err(EnvelopeError::Json(_))));
    }

    #[test]
    fn strict_reports_bad_action_index() {
        let err = decode_strict(
            br#"{"actions":[{"type":"done"},{"type":"warp_ten"}]}"#,
        )
        .unwrap_err();
        match err {
            EnvelopeError::Validation(v) => {
                assert_eq!(v.index, 1);
                assert_eq!(v.kind.as_deref(), Some("warp_ten"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn strict_rejects_empty_action_list() {
        let err = decode_strict(br#"{"actions":[]}"#).unwrap_err();
        assert!(err.to_string().contains("no actions"));
    }

    #[test]
    fn lenient_equals_strict_on_canonical_input() {
        let input = br#"{"actions":[{"type":"read_file","path":"a.rs"}]}"#;
        let strict = decode_strict(input).unwrap();
        let lenient = decode_lenient(input).unwrap();
        assert_eq!(strict, lenient);
    }

    #[test]
    fn lenient_strips_think_tags() {
        let input = b"<think>reasoning</think>{\"actions\":[{\"type\":\"done\"}]}";
        let env = decode_lenient(input).unwrap();
        assert_eq!(env.actions.len(), 1);
        assert_eq!(env.actions[0].kind, Some(ActionKind::Done));
        assert!(env.notes.is_none());
    }

    #[test]
    fn lenient_strips_code_fences() {
        let input = b"Here is the plan:\n```json\n{\"actions\":[{\"type\":\"done\"}]}\n```\nThanks!";
        let env = decode_lenient(input).unwrap();
        assert_eq!(env.actions[0].kind, Some(ActionKind::Done));
    }

    #[test]
    fn lenient_extracts_json_from_prose() {
        let input =
            b"I'll finish up now. {\"actions\":[{\"type\":\"done\"}]} Let me know if anything fails.";
        let env = decode_lenient(input).unwrap();
        assert_eq!(env.actions[0].kind, Some(ActionKind::Done));
    }

    #[test]
    fn lenient_handles_unbalanced_close_tag() {
        // The opener was lost in a previous stream chunk.
        let input = b"deep thoughts</think>{\"actions\":[{\"type\":\"done\"}]}";
        let env = decode_lenient(input).unwrap();
        assert_eq!(env.actions[0].kind, Some(ActionKind::Done));
    }

    #[test]
    fn lenient_still_fails_on_garbage() {
        assert!(decode_lenient(b"not json at all").is_err());
    }

    #[test]
    fn extract_prefers_object_over_earlier_array() {
        let text = "[1,2,3] then {\"actions\":[]}";
        let extracted = extract_first_json(text).unwrap();
        assert!(extracted.starts_with('{'));
    }

    #[test]
    fn extract_honors_string_escapes() {
        let text = r#"noise {"a":"brace \" } in string","b":1} tail"#;
        let extracted = extract_first_json(text).unwrap();
        assert_eq!(extracted, r#"{"a":"brace \" } in string","b":1}"#);
    }

    #[test]
    fn strip_fences_keeps_unfenced_text() {
        assert_eq!(strip_code_fences("plain"), "plain");
    }

    #[test]
    fn strip_fences_handles_unclosed_fence() {
        let out = strip_code_fences("```json\n{\"a\":1}");
        assert_eq!(out, "{\"a\":1}");
    }

    #[test]
    fn strip_think_handles_unclosed_opener() {
        let out = strip_think_tags("{\"a\":1}<think>never closed");
        assert_eq!(out, "{\"a\":1}");
    }

    #[test]
    fn strip_think_removes_multiple_spans() {
        let out = strip_think_tags("<think>a</think>X<think>b</think>Y");
        assert_eq!(out, "XY");
    }

    #[test]
    fn decoder_is_deterministic() {
        let input = b"<thinking>hm</thinking>{\"actions\":[{\"type\":\"done\"}]}";
        let a = decode_lenient(input).unwrap();
        let b = decode_lenient(input).unwrap();
        assert_eq!(a, b);
    }
}
