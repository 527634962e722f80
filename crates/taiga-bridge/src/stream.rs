//! Server-sent-events stream over one bead's shared context.
//!
//! Connection protocol: an `initial` event carrying the full snapshot, then
//! one `update` event per store mutation, with a comment keepalive while
//! idle. The feed is live-only — events dropped while a client lags are
//! gone; clients that need the full state re-read the snapshot endpoint.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures_util::stream::{once, Stream, StreamExt};
use tracing::debug;

use crate::api_error::ApiError;
use crate::routes::BeadQuery;
use crate::state::BridgeState;

/// Unsubscribes when the SSE stream is dropped (client disconnect or server
/// shutdown), closing the subscriber channel exactly once.
struct SubscriptionGuard {
    store: Arc<taiga_context::SharedContextStore>,
    bead_id: String,
    sub_id: u64,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        debug!(bead_id = %self.bead_id, sub_id = self.sub_id, "SSE client disconnected");
        self.store.unsubscribe(&self.bead_id, self.sub_id);
    }
}

/// GET /beads/context/stream?bead_id=…
pub(crate) async fn stream_context(
    Query(query): Query<BeadQuery>,
    State(state): State<Arc<BridgeState>>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let snapshot = state.store.export(&query.bead_id)?;
    let subscription = state.store.subscribe(&query.bead_id)?;

    let guard = SubscriptionGuard {
        store: state.store.clone(),
        bead_id: query.bead_id.clone(),
        sub_id: subscription.id,
    };

    let initial = once(async move {
        Ok(SseEvent::default()
            .event("initial")
            .json_data(&snapshot)
            .unwrap_or_else(|_| SseEvent::default().event("initial").data("{}")))
    });

    let updates = subscription.receiver.into_stream().map(move |event| {
        // The guard lives inside this closure; dropping the stream
        // unsubscribes.
        let _ = &guard;
        Ok(SseEvent::default()
            .event("update")
            .json_data(&event)
            .unwrap_or_else(|_| SseEvent::default().event("update").data("{}")))
    });

    let stream = initial.chain(updates);
    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(state.keepalive)
            .text("keepalive"),
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
