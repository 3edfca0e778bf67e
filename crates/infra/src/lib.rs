//! # crmsync Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - The in-memory sync queue store
//! - The queue processor and reclaimer workers
//! - CRM provider adapters (Salesforce, HubSpot, Zoho CRM, Pipedrive)
//! - Configuration loading and dispatch metrics
//!
//! ## Architecture
//! - Implements traits defined in `crmsync-core`
//! - Contains all "impure" code (I/O, timers, HTTP)

pub mod config;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod observability;
pub mod sync;

// Re-export commonly used items
pub use errors::InfraError;
pub use http::HttpClient;
pub use integrations::crm::build_registry;
pub use observability::{DispatchMetrics, DispatchMetricsSnapshot};
pub use sync::{
    InMemorySyncQueue, ProcessorConfig, QueueProcessor, Reclaimer, ReclaimerConfig, TickHandle,
    TickReport, WorkerError,
};
