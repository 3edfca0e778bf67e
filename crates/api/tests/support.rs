//! Shared helpers for app-level tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crmsync_common::time::MockClock;
use crmsync_core::sync::{ProviderAdapter, ProviderRegistry, ProviderRequest};
use crmsync_domain::{
    Config, DispatchError, EnqueueRequest, ProviderDescriptor, RecordKind, SyncPayload,
};
use crmsync_lib::AppContext;
use serde_json::json;

/// Adapter that answers `remote-{n}`, or fails with a fixed error.
pub struct FakeCrm {
    descriptor: ProviderDescriptor,
    failure: Option<DispatchError>,
    delay: Duration,
    sends: AtomicUsize,
}

impl FakeCrm {
    pub fn ok(id: &str) -> Arc<Self> {
        Arc::new(Self {
            descriptor: ProviderDescriptor::new(id, id, &RecordKind::ALL),
            failure: None,
            delay: Duration::ZERO,
            sends: AtomicUsize::new(0),
        })
    }

    /// Succeeds, but each send takes `delay`.
    pub fn slow(id: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            descriptor: ProviderDescriptor::new(id, id, &RecordKind::ALL),
            failure: None,
            delay,
            sends: AtomicUsize::new(0),
        })
    }

    pub fn failing(id: &str, failure: DispatchError) -> Arc<Self> {
        Arc::new(Self {
            descriptor: ProviderDescriptor::new(id, id, &RecordKind::ALL),
            failure: Some(failure),
            delay: Duration::ZERO,
            sends: AtomicUsize::new(0),
        })
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for FakeCrm {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn authenticate(&self) -> Result<(), DispatchError> {
        Ok(())
    }

    fn map_payload(
        &self,
        _kind: RecordKind,
        payload: &SyncPayload,
    ) -> Result<ProviderRequest, DispatchError> {
        Ok(ProviderRequest::new("record", payload.as_value().clone()))
    }

    async fn send(&self, _request: ProviderRequest) -> Result<String, DispatchError> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(format!("remote-{n}")),
        }
    }
}

/// Config with both workers disabled; tests drive ticks by hand.
pub fn manual_config() -> Config {
    let mut config = Config::default();
    config.sync.enabled = false;
    config.reclaim.enabled = false;
    config
}

pub fn context_with(adapters: Vec<Arc<FakeCrm>>, config: Config) -> (AppContext, MockClock) {
    let mut registry = ProviderRegistry::new();
    for adapter in adapters {
        registry.register(adapter);
    }
    let clock = MockClock::new();
    let context = AppContext::with_parts(config, registry, Arc::new(clock.clone()))
        .expect("context builds");
    (context, clock)
}

pub fn call_log(provider: &str, call_id: &str) -> EnqueueRequest {
    EnqueueRequest::new(
        RecordKind::CallLog,
        provider,
        json!({
            "callId": call_id,
            "direction": "inbound",
            "fromNumber": "+15550100",
            "toNumber": "+15550111",
            "startedAt": "2024-06-03T14:00:00Z",
            "durationSecs": 30
        }),
    )
    .with_correlation_key(format!("call:{call_id}"))
}
