//! # crmsync Domain
//!
//! Business domain types for the outbound CRM sync queue.
//!
//! This crate contains:
//! - Sync items, statuses, correlation keys and typed record shapes
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other crmsync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
