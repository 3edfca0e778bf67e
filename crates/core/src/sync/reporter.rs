//! Read-only status queries over the sync queue

use std::sync::Arc;

use crmsync_domain::{
    AggregateCounts, CorrelationKey, CrmSyncError, Result, SyncFilter, SyncItemId, SyncItemView,
};
use tracing::instrument;

use super::ports::SyncQueueStore;

/// Status reporter
///
/// Every call works on a copy taken by the store, so callers never hold the
/// queue lock across an await.
#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<dyn SyncQueueStore>,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn SyncQueueStore>) -> Self {
        Self { store }
    }

    /// View of a single item; `NotFound` for unknown or reclaimed ids.
    #[instrument(skip(self), fields(item_id = %id))]
    pub async fn status_of(&self, id: &SyncItemId) -> Result<SyncItemView> {
        self.store
            .get(id)
            .await?
            .map(|item| item.view())
            .ok_or_else(|| CrmSyncError::NotFound(format!("sync item {id}")))
    }

    /// Items tagged with `key`, oldest first. Empty when nothing matches.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn status_by_correlation_key(&self, key: &CorrelationKey) -> Result<Vec<SyncItemView>> {
        let items = self.store.query(&SyncFilter::by_correlation_key(key.clone())).await?;
        Ok(items.iter().map(|item| item.view()).collect())
    }

    /// Per-status counts, optionally narrowed by `filter`.
    pub async fn summary(&self, filter: Option<&SyncFilter>) -> Result<AggregateCounts> {
        match filter {
            Some(filter) => self.store.counts(filter).await,
            None => self.store.counts(&SyncFilter::default()).await,
        }
    }
}
