//! Error conversions at the infrastructure boundary

pub mod conversions;

pub use conversions::{dispatch_error_from_http, InfraError};
