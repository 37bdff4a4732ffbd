//! Process-wide service helpers (tracing, metrics, operational log sink).

pub mod telemetry;

pub use telemetry::*;
