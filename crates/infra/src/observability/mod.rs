//! Observability infrastructure for the sync workers
//!
//! Counters are plain atomics; a serializable snapshot is logged by the
//! processor after each tick and can be exposed by the application.

pub mod metrics;

pub use metrics::{DispatchMetrics, DispatchMetricsSnapshot};
