//! Resilience patterns for bounding load on downstream providers
//!
//! - **Bulkhead**: fixed pool of concurrency slots with non-blocking acquire

pub mod bulkhead;

pub use bulkhead::{Bulkhead, BulkheadMetrics, BulkheadSlot};
