use std::sync::Arc;
use std::time::Duration;

use taiga_context::SharedContextStore;

/// Shared state for all `/beads/*` handlers.
pub struct BridgeState {
    pub store: Arc<SharedContextStore>,
    /// SSE comment keepalive period.
    pub keepalive: Duration,
}

impl BridgeState {
    pub fn new(store: Arc<SharedContextStore>) -> Self {
        Self {
            store,
            keepalive: Duration::from_secs(30),
        }
    }

    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }
}
