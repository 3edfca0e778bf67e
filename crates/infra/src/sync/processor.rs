//! Queue processor: periodic, bounded-concurrency dispatch of sync items.
//!
//! Each tick lists up to `batch_size` eligible items, acquires a worker slot
//! per item without waiting, atomically claims it and dispatches it to its
//! provider adapter under a hard timeout. When the pool is saturated the
//! rest of the tick is skipped; those items stay eligible for the next one.
//!
//! The worker follows the same lifecycle as the other background services:
//! join handles are tracked, cancellation is explicit and `stop` waits with
//! a timeout.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use crmsync_common::time::SystemClock;
//! use crmsync_core::sync::{ProviderRegistry, RetryPolicies};
//! use crmsync_infra::observability::DispatchMetrics;
//! use crmsync_infra::sync::{InMemorySyncQueue, ProcessorConfig, QueueProcessor};
//!
//! # async fn example() -> Result<(), crmsync_infra::sync::WorkerError> {
//! let mut processor = QueueProcessor::new(
//!     Arc::new(InMemorySyncQueue::new()),
//!     Arc::new(ProviderRegistry::new()),
//!     Arc::new(RetryPolicies::default()),
//!     Arc::new(SystemClock),
//!     ProcessorConfig::default(),
//!     Arc::new(DispatchMetrics::new()),
//! );
//!
//! processor.start()?;
//! // ... application runs ...
//! processor.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crmsync_common::resilience::Bulkhead;
use crmsync_common::time::Clock;
use crmsync_core::sync::{
    ProviderRegistry, Resolution, RetryDecision, RetryPolicies, SyncQueueStore,
};
use crmsync_domain::constants::DEFAULT_JOIN_TIMEOUT_SECS;
use crmsync_domain::{CrmSyncError, DispatchError, SyncConfig, SyncItem, SyncStatus};
use futures::FutureExt;
use serde::Serialize;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::observability::DispatchMetrics;
use crate::sync::errors::{WorkerError, WorkerResult};

const WORKER: &str = "queue processor";

/// Configuration for the queue processor.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Interval between ticks
    pub tick_interval: Duration,
    /// Maximum items examined per tick
    pub batch_size: usize,
    /// Maximum concurrent dispatches
    pub worker_pool_size: usize,
    /// Hard limit on one dispatch (authenticate, map and send)
    pub dispatch_timeout: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for ProcessorConfig {
    fn from(config: &SyncConfig) -> Self {
        let dispatch_timeout = Duration::from_secs(config.dispatch_timeout_secs);
        Self {
            tick_interval: Duration::from_secs(config.tick_interval_secs),
            batch_size: config.batch_size,
            worker_pool_size: config.worker_pool_size,
            dispatch_timeout,
            // A tick in progress is allowed to finish its dispatches.
            join_timeout: dispatch_timeout + Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECS),
        }
    }
}

/// Outcome counts of a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub eligible: usize,
    pub claimed: usize,
    pub completed: usize,
    pub retry_scheduled: usize,
    pub failed_terminal: usize,
    /// Eligible items left for a later tick because the pool was full.
    pub skipped_for_capacity: usize,
}

impl TickReport {
    fn record(&mut self, status: SyncStatus) {
        match status {
            SyncStatus::Completed => self.completed += 1,
            SyncStatus::FailedRetryable => self.retry_scheduled += 1,
            SyncStatus::FailedTerminal => self.failed_terminal += 1,
            SyncStatus::Pending | SyncStatus::InFlight => {}
        }
    }

    pub fn is_idle(&self) -> bool {
        self.eligible == 0
    }
}

/// Everything a tick needs, shared with the spawned dispatch tasks.
struct Dispatcher {
    store: Arc<dyn SyncQueueStore>,
    registry: Arc<ProviderRegistry>,
    policies: Arc<RetryPolicies>,
    clock: Arc<dyn Clock>,
    bulkhead: Bulkhead,
    metrics: Arc<DispatchMetrics>,
    batch_size: usize,
    dispatch_timeout: Duration,
}

impl Dispatcher {
    async fn process_tick(self: &Arc<Self>) -> Result<TickReport, CrmSyncError> {
        self.metrics.record_tick();
        let eligible = self.store.list_eligible(self.batch_size, self.clock.now()).await?;
        let mut report = TickReport { eligible: eligible.len(), ..TickReport::default() };

        if eligible.is_empty() {
            debug!("No eligible sync items");
            return Ok(report);
        }

        let mut tasks = JoinSet::new();
        let mut claim_error = None;
        for (index, candidate) in eligible.iter().enumerate() {
            let Some(slot) = self.bulkhead.try_acquire() else {
                report.skipped_for_capacity = eligible.len() - index;
                self.metrics.record_capacity_skips(report.skipped_for_capacity);
                debug!(skipped = report.skipped_for_capacity, "Worker pool saturated");
                break;
            };

            // Claim before spawning so dispatch order follows enqueue order.
            let item = match self.store.claim(&candidate.id, self.clock.now()).await {
                Ok(Some(item)) => item,
                Ok(None) => continue,
                Err(err) => {
                    // Items claimed so far still have to be resolved.
                    error!(item_id = %candidate.id, error = %err, "Claim failed, ending tick early");
                    claim_error = Some(err);
                    break;
                }
            };
            report.claimed += 1;
            self.metrics.record_claimed();

            let this = Arc::clone(self);
            tasks.spawn(async move {
                let _slot = slot;
                this.dispatch_and_resolve(item).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(status)) => report.record(status),
                Ok(Err(err)) => error!(error = %err, "Failed to record dispatch outcome"),
                Err(err) => error!(error = %err, "Dispatch task failed to join"),
            }
        }

        match claim_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    #[instrument(
        skip(self, item),
        fields(item_id = %item.id, provider = %item.provider, kind = %item.kind, attempt = item.attempts)
    )]
    async fn dispatch_and_resolve(&self, item: SyncItem) -> Result<SyncStatus, CrmSyncError> {
        let started = Instant::now();
        let outcome = self.dispatch(&item).await;
        let now = self.clock.now();

        let resolution = match outcome {
            Ok(remote_id) => {
                debug!(remote_id = %remote_id, elapsed_ms = started.elapsed().as_millis() as u64, "Dispatched");
                self.metrics.record_completed();
                Resolution::Completed { remote_id }
            }
            Err(err) => self.resolution_for_failure(&item, &err, now),
        };

        let resolved = self.store.resolve(&item.id, resolution, now).await?;
        Ok(resolved.status)
    }

    fn resolution_for_failure(
        &self,
        item: &SyncItem,
        err: &DispatchError,
        now: DateTime<Utc>,
    ) -> Resolution {
        let policy = self.policies.for_provider(&item.provider);
        match policy.decide_with_cap(item.attempts, item.max_attempts, err.failure_class()) {
            RetryDecision::RetryAfter(delay) => {
                let next_attempt_at = chrono::Duration::from_std(delay)
                    .ok()
                    .and_then(|delay| now.checked_add_signed(delay))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                warn!(
                    error = %err,
                    reason = err.label(),
                    retry_in_secs = delay.as_secs(),
                    "Dispatch failed, retry scheduled"
                );
                self.metrics.record_retry_scheduled();
                Resolution::Retry { error: err.to_string(), next_attempt_at }
            }
            RetryDecision::GiveUp => {
                warn!(error = %err, reason = err.label(), "Dispatch failed permanently");
                self.metrics.record_failed_terminal();
                Resolution::Terminal { error: err.to_string() }
            }
        }
    }

    /// Run one adapter call under the dispatch timeout.
    ///
    /// Panics inside the adapter surface as `Unclassified` failures.
    async fn dispatch(&self, item: &SyncItem) -> Result<String, DispatchError> {
        let Some(adapter) = self.registry.get(&item.provider) else {
            return Err(DispatchError::auth(&item.provider, "no adapter registered"));
        };

        let attempt = async {
            adapter.authenticate().await?;
            let request = adapter
                .map_payload(item.kind, &item.payload)?
                .with_idempotency_key(item.id.to_string());
            adapter.send(request).await
        };

        match tokio::time::timeout(self.dispatch_timeout, AssertUnwindSafe(attempt).catch_unwind())
            .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => {
                self.metrics.record_panic();
                Err(DispatchError::Unclassified(format!(
                    "adapter panicked: {}",
                    panic_message(panic.as_ref())
                )))
            }
            Err(_) => {
                self.metrics.record_timeout();
                Err(DispatchError::Timeout(self.dispatch_timeout))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Cloneable handle for running ticks without holding the processor.
///
/// Shares the worker pool and store with the background loop.
#[derive(Clone)]
pub struct TickHandle {
    dispatcher: Arc<Dispatcher>,
}

impl TickHandle {
    pub async fn process_tick(&self) -> WorkerResult<TickReport> {
        Ok(self.dispatcher.process_tick().await?)
    }
}

/// Queue processor with explicit lifecycle management.
pub struct QueueProcessor {
    dispatcher: Arc<Dispatcher>,
    config: ProcessorConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl QueueProcessor {
    pub fn new(
        store: Arc<dyn SyncQueueStore>,
        registry: Arc<ProviderRegistry>,
        policies: Arc<RetryPolicies>,
        clock: Arc<dyn Clock>,
        config: ProcessorConfig,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher {
            store,
            registry,
            policies,
            clock,
            bulkhead: Bulkhead::new(config.worker_pool_size),
            metrics,
            batch_size: config.batch_size.max(1),
            dispatch_timeout: config.dispatch_timeout,
        });
        Self { dispatcher, config, cancellation: CancellationToken::new(), task_handle: None }
    }

    /// Run one tick now and wait for its dispatches to settle.
    ///
    /// Safe to call while the background loop is running; both share the
    /// same worker pool, and claims keep an item from dispatching twice.
    pub async fn process_tick(&self) -> WorkerResult<TickReport> {
        self.tick_handle().process_tick().await
    }

    pub fn tick_handle(&self) -> TickHandle {
        TickHandle { dispatcher: Arc::clone(&self.dispatcher) }
    }

    /// Start the worker, spawning the background tick loop.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> WorkerResult<()> {
        if self.is_running() {
            return Err(WorkerError::AlreadyRunning(WORKER));
        }

        info!(
            tick_secs = self.config.tick_interval.as_secs(),
            batch_size = self.config.batch_size,
            pool = self.config.worker_pool_size,
            "Starting queue processor"
        );

        self.cancellation = CancellationToken::new();

        let dispatcher = Arc::clone(&self.dispatcher);
        let tick_interval = self.config.tick_interval;
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::tick_loop(dispatcher, tick_interval, cancel).await;
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Stop the worker and wait for the loop (and any tick in progress) to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> WorkerResult<()> {
        if !self.is_running() {
            return Err(WorkerError::NotRunning(WORKER));
        }

        info!("Stopping queue processor");
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            let join_timeout = self.config.join_timeout;
            match tokio::time::timeout(join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Queue processor task panicked: {}", e);
                    return Err(WorkerError::TaskJoinFailed(e.to_string()));
                }
                Err(_) => {
                    warn!("Queue processor task did not complete within timeout");
                    return Err(WorkerError::Timeout {
                        worker: WORKER,
                        seconds: join_timeout.as_secs(),
                    });
                }
            }
        }

        info!("Queue processor stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.dispatcher.metrics
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    async fn tick_loop(
        dispatcher: Arc<Dispatcher>,
        tick_interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Queue processor loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(tick_interval) => {
                    let started = Instant::now();
                    match dispatcher.process_tick().await {
                        Ok(report) if report.is_idle() => {}
                        Ok(report) => {
                            info!(
                                claimed = report.claimed,
                                completed = report.completed,
                                retry_scheduled = report.retry_scheduled,
                                failed_terminal = report.failed_terminal,
                                skipped = report.skipped_for_capacity,
                                duration_ms = started.elapsed().as_millis() as u64,
                                "Tick processed"
                            );
                        }
                        Err(e) => {
                            error!(error = %e, "Tick failed");
                        }
                    }
                }
            }
        }
    }
}

impl Drop for QueueProcessor {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("QueueProcessor dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
