//! Sync workers for crmsync
//!
//! This module provides the queue store and the background services around it:
//! - InMemorySyncQueue: process-local queue store
//! - QueueProcessor: periodic, bounded-concurrency dispatch to providers
//! - Reclaimer: periodic removal of settled items past retention
//!
//! Both workers use explicit lifecycle management, join handle tracking and
//! cancellation support.

mod errors;
pub mod processor;
pub mod queue;
pub mod reclaimer;

pub use errors::{WorkerError, WorkerResult};
pub use processor::{ProcessorConfig, QueueProcessor, TickHandle, TickReport};
pub use queue::InMemorySyncQueue;
pub use reclaimer::{ReclaimDryRun, ReclaimStats, Reclaimer, ReclaimerConfig};
