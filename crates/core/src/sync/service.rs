//! Sync service - inbound and outbound operations of the sync queue

use std::sync::Arc;

use crmsync_common::time::Clock;
use crmsync_domain::{
    AggregateCounts, CorrelationKey, CrmSyncError, EnqueueRequest, ProviderId, ProviderInfo,
    Result, SyncFilter, SyncItem, SyncItemId, SyncItemView,
};
use tracing::{debug, info, instrument};

use super::ports::SyncQueueStore;
use super::registry::ProviderRegistry;
use super::reporter::StatusReporter;
use super::retry::RetryPolicies;

/// Front door of the sync queue.
///
/// Validates and enqueues records, answers status queries and lists
/// providers. Dispatching happens elsewhere (the queue processor).
#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn SyncQueueStore>,
    registry: Arc<ProviderRegistry>,
    policies: Arc<RetryPolicies>,
    reporter: StatusReporter,
    clock: Arc<dyn Clock>,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn SyncQueueStore>,
        registry: Arc<ProviderRegistry>,
        policies: Arc<RetryPolicies>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let reporter = StatusReporter::new(Arc::clone(&store));
        Self { store, registry, policies, reporter, clock }
    }

    /// Validate and queue one record; returns its id.
    ///
    /// Providers without a registered or configured adapter are accepted
    /// here and fail at dispatch time.
    #[instrument(skip(self, request), fields(kind = ?request.kind, provider = ?request.provider))]
    pub async fn enqueue(&self, request: EnqueueRequest) -> Result<SyncItemId> {
        let item = self.build_item(request)?;
        if !self.registry.is_configured(&item.provider) {
            debug!(provider = %item.provider, "Enqueued for a provider that is not configured");
        }
        let id = self.store.enqueue(item).await?;
        debug!(item_id = %id, "Sync item enqueued");
        Ok(id)
    }

    /// Validate and queue several records, all or nothing.
    ///
    /// The first invalid entry rejects the whole batch and is named by its
    /// index in the error.
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn enqueue_bulk(&self, requests: Vec<EnqueueRequest>) -> Result<Vec<SyncItemId>> {
        let mut items = Vec::with_capacity(requests.len());
        for (index, request) in requests.into_iter().enumerate() {
            let item = self.build_item(request).map_err(|err| match err {
                CrmSyncError::InvalidItem(msg) => {
                    CrmSyncError::InvalidItem(format!("entry {index}: {msg}"))
                }
                other => other,
            })?;
            items.push(item);
        }
        let ids = self.store.enqueue_bulk(items).await?;
        info!(count = ids.len(), "Sync items enqueued in bulk");
        Ok(ids)
    }

    pub async fn get_status(&self, id: &SyncItemId) -> Result<SyncItemView> {
        self.reporter.status_of(id).await
    }

    /// Look up items by a `kind:value` correlation key.
    pub async fn status_by_correlation_key(&self, key: &str) -> Result<Vec<SyncItemView>> {
        let key: CorrelationKey = key.parse()?;
        self.reporter.status_by_correlation_key(&key).await
    }

    pub async fn summary(&self, filter: Option<&SyncFilter>) -> Result<AggregateCounts> {
        self.reporter.summary(filter).await
    }

    pub fn supported_providers(&self) -> Vec<ProviderInfo> {
        self.registry.supported_providers()
    }

    pub fn is_configured(&self, provider: &str) -> bool {
        self.registry.is_configured(&ProviderId::new(provider))
    }

    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    fn build_item(&self, request: EnqueueRequest) -> Result<SyncItem> {
        let validated = request.validate()?;
        let max_attempts = self.policies.for_provider(&validated.provider).max_attempts;
        Ok(SyncItem::new(validated, max_attempts, self.clock.now()))
    }
}
