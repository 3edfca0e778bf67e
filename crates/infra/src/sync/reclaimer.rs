//! Reclaimer: periodic removal of settled sync items
//!
//! Items in `completed` or `failed-terminal` whose settle time is older than
//! the retention window are deleted from the queue. Pending, in-flight and
//! retryable items are never touched.
//!
//! # Features
//!
//! - Periodic reclamation on a fixed interval
//! - Dry-run mode for inspection
//! - Graceful shutdown with cancellation

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crmsync_common::time::Clock;
use crmsync_core::sync::SyncQueueStore;
use crmsync_domain::constants::DEFAULT_JOIN_TIMEOUT_SECS;
use crmsync_domain::{CrmSyncError, ReclaimConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::observability::DispatchMetrics;
use crate::sync::errors::{WorkerError, WorkerResult};

const WORKER: &str = "reclaimer";

type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for the reclaimer
#[derive(Debug, Clone)]
pub struct ReclaimerConfig {
    /// How long settled items are kept
    pub retention: Duration,
    /// Interval between passes
    pub interval: Duration,
    pub join_timeout: Duration,
}

impl Default for ReclaimerConfig {
    fn default() -> Self {
        Self::from(&ReclaimConfig::default())
    }
}

impl From<&ReclaimConfig> for ReclaimerConfig {
    fn from(config: &ReclaimConfig) -> Self {
        Self {
            retention: Duration::from_secs(config.retention_secs),
            interval: Duration::from_secs(config.interval_secs),
            join_timeout: Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECS),
        }
    }
}

/// Statistics from one reclaim pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReclaimStats {
    pub removed: usize,
    pub cutoff: DateTime<Utc>,
    pub duration_secs: f64,
}

/// Dry-run result (what would be removed)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReclaimDryRun {
    pub reclaimable: usize,
    pub cutoff: DateTime<Utc>,
}

/// Background reclaimer with lifecycle management
#[derive(Clone)]
pub struct Reclaimer {
    store: Arc<dyn SyncQueueStore>,
    clock: Arc<dyn Clock>,
    config: ReclaimerConfig,
    metrics: Option<Arc<DispatchMetrics>>,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl Reclaimer {
    pub fn new(store: Arc<dyn SyncQueueStore>, clock: Arc<dyn Clock>, config: ReclaimerConfig) -> Self {
        Self {
            store,
            clock,
            config,
            metrics: None,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Start the reclaimer
    ///
    /// Spawns a background task that reclaims on every interval.
    ///
    /// # Errors
    ///
    /// Returns error if the reclaimer is already running
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> WorkerResult<()> {
        if self.is_running().await {
            return Err(WorkerError::AlreadyRunning(WORKER));
        }

        info!(
            retention_secs = self.config.retention.as_secs(),
            interval_secs = self.config.interval.as_secs(),
            "Starting reclaimer"
        );

        // Fresh token so the reclaimer can be restarted after stop
        self.cancellation_token = CancellationToken::new();

        let worker = self.clone();
        let cancel = self.cancellation_token.clone();
        let handle = tokio::spawn(async move {
            worker.reclaim_loop(cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);
        Ok(())
    }

    /// Stop the reclaimer gracefully
    ///
    /// # Errors
    ///
    /// Returns error if the reclaimer is not running or does not stop in time
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> WorkerResult<()> {
        if !self.is_running().await {
            return Err(WorkerError::NotRunning(WORKER));
        }

        info!("Stopping reclaimer");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let join_timeout = self.config.join_timeout;
            match tokio::time::timeout(join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Reclaimer task panicked: {}", e);
                    return Err(WorkerError::TaskJoinFailed(e.to_string()));
                }
                Err(_) => {
                    warn!("Reclaimer task did not complete within timeout");
                    return Err(WorkerError::Timeout {
                        worker: WORKER,
                        seconds: join_timeout.as_secs(),
                    });
                }
            }
        }

        info!("Reclaimer stopped");
        Ok(())
    }

    /// A reclaimer is running while it has an unfinished task handle.
    pub async fn is_running(&self) -> bool {
        let guard = self.task_handle.lock().await;
        guard.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Run one pass immediately.
    #[instrument(skip(self))]
    pub async fn reclaim_once(&self) -> Result<ReclaimStats, CrmSyncError> {
        let start = Instant::now();
        let cutoff = self.cutoff();

        let ids = self.store.reclaimable(cutoff).await?;
        let removed = if ids.is_empty() { 0 } else { self.store.remove(&ids).await? };

        if let Some(metrics) = &self.metrics {
            metrics.record_reclaimed(removed);
        }

        let stats =
            ReclaimStats { removed, cutoff, duration_secs: start.elapsed().as_secs_f64() };
        info!(removed = stats.removed, cutoff = %cutoff, "Reclaim completed");
        Ok(stats)
    }

    /// Count what a pass would remove without removing anything.
    #[instrument(skip(self))]
    pub async fn dry_run(&self) -> Result<ReclaimDryRun, CrmSyncError> {
        let cutoff = self.cutoff();
        let reclaimable = self.store.reclaimable(cutoff).await?.len();
        Ok(ReclaimDryRun { reclaimable, cutoff })
    }

    fn cutoff(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        chrono::Duration::from_std(self.config.retention)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    async fn reclaim_loop(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Reclaim loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(self.config.interval) => {
                    match self.reclaim_once().await {
                        Ok(stats) => debug!(removed = stats.removed, "Periodic reclaim completed"),
                        Err(e) => warn!(error = %e, "Periodic reclaim failed"),
                    }
                }
            }
        }
    }
}
