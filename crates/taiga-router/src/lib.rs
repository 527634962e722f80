//! Action router — the execution half of the agent action loop.
//!
//! A validated envelope goes in; one [`taiga_core::types::ActionResult`] per
//! action comes out, in order. Capabilities (files, git, commands, beads,
//! workflow, messaging, shared context) are injected as optional trait
//! objects; a handler whose capability is missing degrades gracefully —
//! mutations fall back to filing a bead so the work is not lost, queries
//! report a plain error.

pub mod cancel;
pub mod capability;
pub mod executor;
pub mod feedback;
pub mod fs;
pub mod git;
pub mod git_adapter;
pub mod git_router;
pub mod handlers;
pub mod router;

pub use cancel::CancelToken;
pub use router::ActionRouter;
