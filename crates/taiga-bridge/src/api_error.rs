//! HTTP API error types.
//!
//! Provides a unified `ApiError` enum for consistent error responses across
//! the bridge. Implements Axum's `IntoResponse` trait to automatically
//! convert errors into appropriate HTTP responses, including the 409
//! version-conflict shape the shared-context clients rely on.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use taiga_core::error::ContextError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur in the HTTP API layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was malformed or invalid.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Optimistic-concurrency conflict on a shared-context update.
    #[error("version conflict: expected {expected}, actual {actual}")]
    Conflict { expected: u64, actual: u64 },

    /// An internal server error occurred.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<ContextError> for ApiError {
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::NotFound(bead_id) => {
                ApiError::NotFound(format!("no shared context for bead {bead_id}"))
            }
            ContextError::Conflict {
                expected, actual, ..
            } => ApiError::Conflict { expected, actual },
        }
    }
}

// ---------------------------------------------------------------------------
// IntoResponse implementation
// ---------------------------------------------------------------------------

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Conflict { expected, actual } => {
                let body = Json(json!({
                    "error": "version_conflict",
                    "expected": expected,
                    "actual": actual,
                }));
                (StatusCode::CONFLICT, body).into_response()
            }
            ApiError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => error_response(StatusCode::BAD_REQUEST, msg),
            ApiError::InternalError(msg) => {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    let body = Json(json!({
        "error": message
    }));
    (status, body).into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn not_found_response() {
        let response = ApiError::NotFound("bead missing".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_str = String::from_utf8(body.to_vec()).unwrap();
        assert!(body_str.contains("\"error\""));
        assert!(body_str.contains("bead missing"));
    }

    #[tokio::test]
    async fn conflict_response_carries_versions() {
        let response = ApiError::Conflict {
            expected: 1,
            actual: 4,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["error"], "version_conflict");
        assert_eq!(parsed["expected"], 1);
        assert_eq!(parsed["actual"], 4);
    }

    #[tokio::test]
    async fn context_error_maps_to_api_error() {
        let api: ApiError = ContextError::NotFound("b-9".into()).into();
        assert!(matches!(api, ApiError::NotFound(_)));

        let api: ApiError = ContextError::Conflict {
            bead_id: "b-9".into(),
            expected: 2,
            actual: 5,
        }
        .into();
        assert!(matches!(
            api,
            ApiError::Conflict {
                expected: 2,
                actual: 5
            }
        ));
    }
}
