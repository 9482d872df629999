//! Telemetry and observability.
//!
//! Counters and a run-time histogram for a pool, plus exporters that turn a
//! snapshot into JSON or a log event.

pub mod export;
pub mod metrics;

pub use export::{JsonExporter, LogExporter, MetricsExporter};
pub use metrics::{Metrics, MetricsSnapshot};
