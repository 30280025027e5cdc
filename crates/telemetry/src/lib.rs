//! Process-local telemetry for the log pipeline.
//!
//! Metrics and health live in global registries so every crate can record into them
//! without plumbing; they are read back by the HTTP health and stats endpoints.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
