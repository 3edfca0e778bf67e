//! Worker lifecycle errors for the processor and reclaimer

use crmsync_domain::CrmSyncError;
use thiserror::Error;

use crate::errors::InfraError;

/// Errors from starting, stopping or running a background worker
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Worker is already running
    #[error("{0} already running")]
    AlreadyRunning(&'static str),

    /// Worker is not running
    #[error("{0} not running")]
    NotRunning(&'static str),

    /// Background task did not finish within the join timeout
    #[error("{worker} did not stop within {seconds}s")]
    Timeout { worker: &'static str, seconds: u64 },

    /// Task join failed (panic or abort)
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),

    /// Queue store failure surfaced by a manual run
    #[error(transparent)]
    Queue(#[from] CrmSyncError),
}

impl From<WorkerError> for InfraError {
    fn from(err: WorkerError) -> Self {
        let domain = match err {
            WorkerError::Queue(inner) => inner,
            other => CrmSyncError::Internal(other.to_string()),
        };
        InfraError(domain)
    }
}

impl From<WorkerError> for CrmSyncError {
    fn from(err: WorkerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;
