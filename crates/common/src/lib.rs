//! Common utilities shared across crmsync crates.
//!
//! # Feature Tiers
//!
//! - `foundation`: time abstractions (clock)
//! - `runtime`: async infrastructure (bulkhead)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod time;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use resilience::{Bulkhead, BulkheadMetrics, BulkheadSlot};
#[cfg(feature = "foundation")]
pub use time::{Clock, MockClock, SystemClock};
