//! Error types used throughout the sync pipeline

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ProviderId, RecordKind};

/// Main error type for crmsync
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CrmSyncError {
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CrmSyncError {
    /// Stable label suitable for metrics and structured logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidItem(_) => "invalid_item",
            Self::NotFound(_) => "not_found",
            Self::Config(_) => "config",
            Self::Storage(_) => "storage",
            Self::Network(_) => "network",
            Self::Auth(_) => "auth",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for crmsync operations
pub type Result<T> = std::result::Result<T, CrmSyncError>;

/// Whether retrying a failed dispatch can succeed without outside help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureClass {
    /// Timeouts, 5xx, 429, connection trouble.
    Transient,
    /// Validation rejections, unsupported kinds, unrecoverable auth.
    Permanent,
}

crate::impl_domain_status_conversions!(FailureClass {
    Transient => "transient",
    Permanent => "permanent",
});

/// Outcome of a failed provider dispatch.
///
/// Adapters return these from `authenticate`, `map_payload` and `send`; the
/// queue processor turns them into item status through the retry policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Authentication failed for {provider}: {message}")]
    Auth { provider: ProviderId, message: String },

    #[error("Provider {provider} has no mapping for {kind} records")]
    UnsupportedKind { provider: ProviderId, kind: RecordKind },

    #[error("Payload rejected before send: {0}")]
    InvalidPayload(String),

    #[error("Dispatch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Provider server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unclassified adapter failure: {0}")]
    Unclassified(String),
}

impl DispatchError {
    /// Build an auth failure for `provider`.
    pub fn auth(provider: &ProviderId, message: impl Into<String>) -> Self {
        Self::Auth { provider: provider.clone(), message: message.into() }
    }

    /// Classify an HTTP status returned by a provider.
    ///
    /// Successful statuses are not expected here and fall through to
    /// `Unclassified`.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => Self::RateLimited(message),
            500..=599 => Self::Server { status, message },
            400..=499 => Self::Rejected { status, message },
            _ => Self::Unclassified(format!("unexpected status {status}: {message}")),
        }
    }

    /// Retry classification for this failure.
    ///
    /// Unclassified failures are treated as transient: retrying is safer than
    /// silently dropping the record.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::Auth { .. }
            | Self::UnsupportedKind { .. }
            | Self::InvalidPayload(_)
            | Self::Rejected { .. } => FailureClass::Permanent,
            Self::Timeout(_)
            | Self::RateLimited(_)
            | Self::Server { .. }
            | Self::Network(_)
            | Self::Unclassified(_) => FailureClass::Transient,
        }
    }

    /// Stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::UnsupportedKind { .. } => "unsupported_kind",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::Timeout(_) => "timeout",
            Self::RateLimited(_) => "rate_limited",
            Self::Server { .. } => "server",
            Self::Rejected { .. } => "rejected",
            Self::Network(_) => "network",
            Self::Unclassified(_) => "unclassified",
        }
    }
}
