//! Application constants
//!
//! Centralized location for domain-level defaults used by configuration and
//! the sync pipeline.

// Queue processor
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_WORKER_POOL_SIZE: usize = 5;
pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 30;

// Retry policy
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 3600;

// Reclaimer
pub const DEFAULT_RECLAIM_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_RETENTION_SECS: u64 = 24 * 3600;

// Worker shutdown
pub const DEFAULT_JOIN_TIMEOUT_SECS: u64 = 5;

/// Longest `lastError` kept on an item, in characters.
pub const MAX_ERROR_LEN: usize = 256;
