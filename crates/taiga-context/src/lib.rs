//! Shared bead context for multi-agent collaboration.
//!
//! When several agents work the same bead they need three things: membership
//! (who is collaborating), shared keyed state with optimistic concurrency,
//! and a live event stream. [`store::SharedContextStore`] provides all three
//! behind short critical sections — no I/O ever happens under a lock, and
//! event fan-out never blocks a writer on a slow subscriber.

pub mod store;
pub mod types;

pub use store::{SharedContextStore, Subscription};
pub use types::{ActivityEntry, ContextEvent, ContextEventKind, SharedBeadContext};
