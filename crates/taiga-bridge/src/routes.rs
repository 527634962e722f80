//! JSON endpoints over the shared-context store.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::debug;

use taiga_context::SharedBeadContext;
use taiga_core::context::ProjectId;

use crate::api_error::ApiError;
use crate::state::BridgeState;
use crate::stream::stream_context;

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct BeadQuery {
    pub bead_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    pub bead_id: String,
    pub agent_id: String,
    /// Joining an unknown bead creates its context when the project is
    /// named; without it, joining an unknown bead is a 404.
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub bead_id: String,
    pub agent_id: String,
    pub version: u64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDataRequest {
    pub bead_id: String,
    pub agent_id: String,
    pub key: String,
    pub value: Value,
    /// `0` (or omitted) means "don't check".
    #[serde(default)]
    pub expected_version: u64,
}

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub bead_id: String,
    pub agent_id: String,
    pub activity_type: String,
    pub description: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub bead_id: String,
    pub version: u64,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the `/beads/*` router.
pub fn bead_router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/beads/context", get(get_context))
        .route("/beads/context/stream", get(stream_context))
        .route("/beads/join", post(join_bead))
        .route("/beads/leave", post(leave_bead))
        .route("/beads/data", post(update_data))
        .route("/beads/activity", post(add_activity))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_context(
    Query(query): Query<BeadQuery>,
    State(state): State<Arc<BridgeState>>,
) -> Result<Json<SharedBeadContext>, ApiError> {
    let snapshot = state.store.export(&query.bead_id)?;
    Ok(Json(snapshot))
}

async fn join_bead(
    State(state): State<Arc<BridgeState>>,
    Json(req): Json<MembershipRequest>,
) -> Result<Json<MembershipResponse>, ApiError> {
    if let Some(project_id) = &req.project_id {
        state
            .store
            .get_or_create(&req.bead_id, &ProjectId::new(project_id.clone()));
    }
    let version = state.store.join_bead(&req.bead_id, &req.agent_id)?;
    debug!(bead_id = %req.bead_id, agent_id = %req.agent_id, version, "agent joined");
    Ok(Json(MembershipResponse {
        bead_id: req.bead_id,
        agent_id: req.agent_id,
        version,
    }))
}

async fn leave_bead(
    State(state): State<Arc<BridgeState>>,
    Json(req): Json<MembershipRequest>,
) -> Result<Json<MembershipResponse>, ApiError> {
    let version = state.store.leave_bead(&req.bead_id, &req.agent_id)?;
    Ok(Json(MembershipResponse {
        bead_id: req.bead_id,
        agent_id: req.agent_id,
        version,
    }))
}

async fn update_data(
    State(state): State<Arc<BridgeState>>,
    Json(req): Json<UpdateDataRequest>,
) -> Result<Json<VersionResponse>, ApiError> {
    let version = state.store.update_data(
        &req.bead_id,
        &req.agent_id,
        &req.key,
        req.value,
        req.expected_version,
    )?;
    Ok(Json(VersionResponse {
        bead_id: req.bead_id,
        version,
    }))
}

async fn add_activity(
    State(state): State<Arc<BridgeState>>,
    Json(req): Json<ActivityRequest>,
) -> Result<Json<VersionResponse>, ApiError> {
    let version = state.store.add_activity(
        &req.bead_id,
        &req.agent_id,
        &req.activity_type,
        &req.description,
        req.data,
    )?;
    Ok(Json(VersionResponse {
        bead_id: req.bead_id,
        version,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
