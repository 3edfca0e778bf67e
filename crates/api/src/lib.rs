//! # crmsync App
//!
//! Application layer - wiring, command surface and the daemon entry point.
//!
//! This crate contains:
//! - Application context (dependency injection, worker lifecycle)
//! - Commands over the sync queue (enqueue, status, summary, sync now)
//! - Logging setup and health reporting
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires the in-memory queue, provider registry and workers together

pub mod commands;
pub mod context;
pub mod utils;

pub use commands::*;
pub use context::*;
