//! # crmsync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for the queue store and CRM providers
//! - Retry policy and provider registry
//! - The sync service and status reporter
//!
//! ## Architecture Principles
//! - Only depends on `crmsync-common` and `crmsync-domain`
//! - No storage, HTTP, or scheduling code
//! - All external dependencies via traits

pub mod sync;

// Re-export specific items to avoid ambiguity
pub use sync::ports::{ProviderAdapter, ProviderRequest, Resolution, SyncQueueStore};
pub use sync::registry::ProviderRegistry;
pub use sync::reporter::StatusReporter;
pub use sync::retry::{Backoff, RetryDecision, RetryPolicies, RetryPolicy};
pub use sync::service::SyncService;
