//! Envelope decoding for model replies.
//!
//! Language models of varying quality produce the action envelope JSON with
//! varying fidelity: markdown fences, leaked thinking tags, prose around the
//! payload, or no JSON at all. This crate turns those replies into validated
//! [`taiga_core::types::ActionEnvelope`]s through four surfaces:
//!
//! - [`decode_strict`] — exact JSON only, unknown fields rejected
//! - [`decode_lenient`] — strict, then a cleanup pipeline, then strict again
//! - [`parse_simple`] — `{"action": "<verb>", …}` single-action form for
//!   small/local models
//! - [`parse_text`] — `ACTION: VERB` line-oriented fallback for models that
//!   cannot produce JSON
//!
//! Decoding is permissive; validation is strict. Every decoded envelope
//! passes the per-kind required-field validator before it is returned.

pub mod decode;
pub mod simple;
pub mod text;
pub mod validate;

pub use decode::{decode_lenient, decode_strict};
pub use simple::parse_simple;
pub use text::parse_text;
pub use validate::validate_envelope;
