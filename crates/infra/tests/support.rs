//! Shared fixtures for infra integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_common::time::MockClock;
use crmsync_core::sync::{
    ProviderAdapter, ProviderRegistry, ProviderRequest, Resolution, RetryPolicies, SyncQueueStore,
    SyncService,
};
use crmsync_domain::{
    AggregateCounts, CrmSyncError, DispatchError, EnqueueRequest, ProviderDescriptor, RecordKind,
    SyncFilter, SyncItem, SyncItemId, SyncPayload,
};
use crmsync_infra::observability::DispatchMetrics;
use crmsync_infra::sync::{InMemorySyncQueue, ProcessorConfig, QueueProcessor};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// One scripted outcome of `send`.
#[derive(Debug, Clone)]
pub enum Step {
    Succeed(&'static str),
    Fail(DispatchError),
    /// Sleep longer than any test dispatch timeout.
    Hang,
    Panic,
}

/// Adapter whose `send` plays back a script, then succeeds.
pub struct ScriptedAdapter {
    descriptor: ProviderDescriptor,
    configured: bool,
    script: Mutex<VecDeque<Step>>,
    delay: Duration,
    sends: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    keys: Mutex<HashMap<String, usize>>,
    bodies: Mutex<Vec<Value>>,
}

impl ScriptedAdapter {
    pub fn new(id: &str) -> Self {
        Self {
            descriptor: ProviderDescriptor::new(id, id.to_uppercase(), &RecordKind::ALL),
            configured: true,
            script: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            sends: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            keys: Mutex::new(HashMap::new()),
            bodies: Mutex::new(Vec::new()),
        }
    }

    pub fn unconfigured(id: &str) -> Self {
        Self { configured: false, ..Self::new(id) }
    }

    pub fn with_script(self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.script.lock().extend(steps);
        self
    }

    /// Make every send take `delay` (to observe concurrency).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Times each idempotency key (item id) reached `send`.
    pub fn sends_per_key(&self) -> HashMap<String, usize> {
        self.keys.lock().clone()
    }

    /// Request bodies in the order they reached `send`.
    pub fn sent_bodies(&self) -> Vec<Value> {
        self.bodies.lock().clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn authenticate(&self) -> Result<(), DispatchError> {
        if self.configured {
            Ok(())
        } else {
            Err(DispatchError::auth(&self.descriptor.id, "no credentials"))
        }
    }

    fn map_payload(
        &self,
        _kind: RecordKind,
        payload: &SyncPayload,
    ) -> Result<ProviderRequest, DispatchError> {
        Ok(ProviderRequest::new("record", payload.as_value().clone()))
    }

    async fn send(&self, request: ProviderRequest) -> Result<String, DispatchError> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        self.bodies.lock().push(request.body.clone());
        if let Some(key) = request.idempotency_key {
            *self.keys.lock().entry(key).or_default() += 1;
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let step = self.script.lock().pop_front();
        match step {
            None => Ok(format!("remote-{n}")),
            Some(Step::Succeed(id)) => Ok(id.to_string()),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok("too-late".to_string())
            }
            Some(Step::Panic) => panic!("scripted adapter panic"),
        }
    }
}

/// Queue, service, processor and clock wired around the given adapters.
pub struct Harness {
    pub queue: Arc<InMemorySyncQueue>,
    pub service: SyncService,
    pub processor: QueueProcessor,
    pub clock: MockClock,
    pub metrics: Arc<DispatchMetrics>,
}

impl Harness {
    pub fn new(adapters: Vec<Arc<ScriptedAdapter>>, config: ProcessorConfig) -> Self {
        Self::with_policies(adapters, config, RetryPolicies::default())
    }

    pub fn with_policies(
        adapters: Vec<Arc<ScriptedAdapter>>,
        config: ProcessorConfig,
        policies: RetryPolicies,
    ) -> Self {
        let queue = Arc::new(InMemorySyncQueue::new());
        let store: Arc<dyn SyncQueueStore> = queue.clone();
        Self::assemble(adapters, config, policies, queue, store)
    }

    /// Route the processor's claims through a store that fails the
    /// `fail_on`-th claim (1-based) once.
    pub fn with_failing_claim(
        adapters: Vec<Arc<ScriptedAdapter>>,
        config: ProcessorConfig,
        fail_on: usize,
    ) -> Self {
        let queue = Arc::new(InMemorySyncQueue::new());
        let store: Arc<dyn SyncQueueStore> =
            Arc::new(FailingClaimStore::new(Arc::clone(&queue), fail_on));
        Self::assemble(adapters, config, RetryPolicies::default(), queue, store)
    }

    fn assemble(
        adapters: Vec<Arc<ScriptedAdapter>>,
        config: ProcessorConfig,
        policies: RetryPolicies,
        queue: Arc<InMemorySyncQueue>,
        store: Arc<dyn SyncQueueStore>,
    ) -> Self {
        let mut registry = ProviderRegistry::new();
        for adapter in adapters {
            registry.register(adapter);
        }
        let registry = Arc::new(registry);
        let policies = Arc::new(policies);
        let clock = MockClock::new();
        let metrics = Arc::new(DispatchMetrics::new());

        let service = SyncService::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&policies),
            Arc::new(clock.clone()),
        );
        let processor = QueueProcessor::new(
            store,
            registry,
            policies,
            Arc::new(clock.clone()),
            config,
            Arc::clone(&metrics),
        );

        Self { queue, service, processor, clock, metrics }
    }
}

/// In-memory store whose `fail_on`-th claim returns a storage error.
pub struct FailingClaimStore {
    inner: Arc<InMemorySyncQueue>,
    fail_on: usize,
    claims: AtomicUsize,
}

impl FailingClaimStore {
    pub fn new(inner: Arc<InMemorySyncQueue>, fail_on: usize) -> Self {
        Self { inner, fail_on, claims: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl SyncQueueStore for FailingClaimStore {
    async fn enqueue(&self, item: SyncItem) -> crmsync_domain::Result<SyncItemId> {
        self.inner.enqueue(item).await
    }

    async fn enqueue_bulk(&self, items: Vec<SyncItem>) -> crmsync_domain::Result<Vec<SyncItemId>> {
        self.inner.enqueue_bulk(items).await
    }

    async fn get(&self, id: &SyncItemId) -> crmsync_domain::Result<Option<SyncItem>> {
        self.inner.get(id).await
    }

    async fn list_eligible(
        &self,
        max_batch: usize,
        now: DateTime<Utc>,
    ) -> crmsync_domain::Result<Vec<SyncItem>> {
        self.inner.list_eligible(max_batch, now).await
    }

    async fn claim(
        &self,
        id: &SyncItemId,
        now: DateTime<Utc>,
    ) -> crmsync_domain::Result<Option<SyncItem>> {
        let n = self.claims.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on {
            return Err(CrmSyncError::Storage("claim unavailable".into()));
        }
        self.inner.claim(id, now).await
    }

    async fn resolve(
        &self,
        id: &SyncItemId,
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> crmsync_domain::Result<SyncItem> {
        self.inner.resolve(id, resolution, now).await
    }

    async fn query(&self, filter: &SyncFilter) -> crmsync_domain::Result<Vec<SyncItem>> {
        self.inner.query(filter).await
    }

    async fn counts(&self, filter: &SyncFilter) -> crmsync_domain::Result<AggregateCounts> {
        self.inner.counts(filter).await
    }

    async fn reclaimable(&self, cutoff: DateTime<Utc>) -> crmsync_domain::Result<Vec<SyncItemId>> {
        self.inner.reclaimable(cutoff).await
    }

    async fn remove(&self, ids: &[SyncItemId]) -> crmsync_domain::Result<usize> {
        self.inner.remove(ids).await
    }
}

/// Processor settings for tests: short dispatch timeout, no background tick.
pub fn test_config(batch_size: usize, worker_pool_size: usize) -> ProcessorConfig {
    ProcessorConfig {
        tick_interval: Duration::from_millis(20),
        batch_size,
        worker_pool_size,
        dispatch_timeout: Duration::from_millis(200),
        join_timeout: Duration::from_secs(2),
    }
}

pub fn call_log(provider: &str, call_id: &str) -> EnqueueRequest {
    EnqueueRequest::new(
        RecordKind::CallLog,
        provider,
        json!({
            "callId": call_id,
            "direction": "outbound",
            "fromNumber": "+15550100",
            "toNumber": "+15550199",
            "startedAt": "2024-05-01T10:00:00Z",
            "durationSecs": 42
        }),
    )
    .with_correlation_key(format!("call:{call_id}"))
}

pub fn lead(provider: &str, lead_id: &str) -> EnqueueRequest {
    EnqueueRequest::new(
        RecordKind::Lead,
        provider,
        json!({ "leadId": lead_id, "firstName": "Ada", "lastName": "Lovelace" }),
    )
    .with_correlation_key(format!("lead:{lead_id}"))
}
