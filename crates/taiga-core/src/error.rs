use thiserror::Error;

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// Decoder/validator failure for a single action within an envelope.
///
/// Carries the index of the offending action so the orchestrator can file a
/// precise parse-failure bead ("action[3]: missing required field `path`").
#[derive(Debug, Error)]
#[error("action[{index}]{}: {message}", .kind.as_deref().map(|k| format!(" ({k})")).unwrap_or_default())]
pub struct ValidationError {
    /// Zero-based index of the action inside the envelope.
    pub index: usize,
    /// The action kind, when it could be determined.
    pub kind: Option<String>,
    /// Human-readable cause.
    pub message: String,
}

impl ValidationError {
    pub fn new(index: usize, kind: Option<String>, message: impl Into<String>) -> Self {
        Self {
            index,
            kind,
            message: message.into(),
        }
    }

    /// A validation failure that applies to the envelope as a whole.
    pub fn envelope(message: impl Into<String>) -> Self {
        Self {
            index: 0,
            kind: None,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// EnvelopeError
// ---------------------------------------------------------------------------

/// Failure to turn raw model output into a validated envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The bytes were not parseable JSON at all (after any cleanup).
    #[error("invalid JSON: {0}")]
    Json(String),

    /// The JSON parsed but an action failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Text-form input had no recognizable ACTION line.
    #[error("no ACTION line found in text reply")]
    NoAction,
}

// ---------------------------------------------------------------------------
// ContextError
// ---------------------------------------------------------------------------

/// Shared-bead-context store failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("no shared context for bead {0}")]
    NotFound(String),

    /// Optimistic-concurrency conflict: the caller's `expected_version` did
    /// not match the current version.
    #[error("version conflict on bead {bead_id}: expected {expected}, actual {actual}")]
    Conflict {
        bead_id: String,
        expected: u64,
        actual: u64,
    },
}

// ---------------------------------------------------------------------------
// CapabilityError
// ---------------------------------------------------------------------------

/// A capability invocation failed or the capability is not wired.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("git operations require project context")]
    MissingProject,

    #[error("{0}")]
    Operation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CapabilityError {
    pub fn op(message: impl Into<String>) -> Self {
        CapabilityError::Operation(message.into())
    }
}

// ---------------------------------------------------------------------------
// LessonsError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LessonsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display_includes_index() {
        let err = ValidationError::new(3, Some("edit_code".into()), "missing required field `path`");
        let text = err.to_string();
        assert!(text.contains("action[3]"));
        assert!(text.contains("edit_code"));
        assert!(text.contains("path"));
    }

    #[test]
    fn validation_error_display_without_kind() {
        let err = ValidationError::new(0, None, "unknown action type \"explode\"");
        assert_eq!(err.to_string(), "action[0]: unknown action type \"explode\"");
    }

    #[test]
    fn conflict_error_fields() {
        let err = ContextError::Conflict {
            bead_id: "bead-1".into(),
            expected: 1,
            actual: 4,
        };
        assert!(err.to_string().contains("expected 1"));
        assert!(err.to_string().contains("actual 4"));
    }
}
