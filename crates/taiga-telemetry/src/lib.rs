//! Telemetry bootstrap for the taiga services.
//!
//! Thin wrappers over `tracing-subscriber` so every binary and test harness
//! initialises logging the same way.

pub mod logging;

pub use logging::{init_logging, init_logging_json};
