//! HTTP/SSE surface for the shared bead context.
//!
//! Five JSON endpoints plus one server-sent-events stream, all over one
//! [`taiga_context::SharedContextStore`]. Authentication and any outer
//! routing live with the embedding daemon; this crate owns only the
//! `/beads/*` surface.

pub mod api_error;
pub mod routes;
pub mod state;
pub mod stream;

pub use api_error::ApiError;
pub use routes::bead_router;
pub use state::BridgeState;
