//! Outbound CRM sync: ports, retry policy, provider registry and the
//! service/reporter surface.

pub mod ports;
pub mod registry;
pub mod reporter;
pub mod retry;
pub mod service;

pub use ports::{ProviderAdapter, ProviderRequest, Resolution, SyncQueueStore};
pub use registry::ProviderRegistry;
pub use reporter::StatusReporter;
pub use retry::{Backoff, RetryDecision, RetryPolicies, RetryPolicy};
pub use service::SyncService;
