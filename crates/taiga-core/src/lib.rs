//! Core library for taiga — the agent action loop of the orchestrator.
//!
//! This crate provides the foundational vocabulary shared by every other
//! taiga crate:
//! - Typed actions, envelopes, and execution results
//! - Per-turn ambient identity (`ActionContext`)
//! - The fuzzy match-and-replace ladder used by `edit_code`
//! - Per-project lessons persistence and prompt assembly
//! - Configuration and error taxonomy

pub mod config;
pub mod context;
pub mod error;
pub mod lessons;
pub mod patch;
pub mod prompt;
pub mod types;
