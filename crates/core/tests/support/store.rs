//! Vec-backed `SyncQueueStore` for service tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_core::sync::ports::{Resolution, SyncQueueStore};
use crmsync_domain::{
    AggregateCounts, CrmSyncError, Result as DomainResult, SyncFilter, SyncItem, SyncItemId,
    SyncStatus,
};
use parking_lot::Mutex;

#[derive(Default)]
pub struct MockQueueStore {
    items: Mutex<Vec<SyncItem>>,
}

impl MockQueueStore {
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Force an item into a terminal state, bypassing the processor.
    pub fn force_status(&self, id: &SyncItemId, status: SyncStatus) {
        let mut items = self.items.lock();
        if let Some(item) = items.iter_mut().find(|i| &i.id == id) {
            item.status = status;
        }
    }
}

#[async_trait]
impl SyncQueueStore for MockQueueStore {
    async fn enqueue(&self, item: SyncItem) -> DomainResult<SyncItemId> {
        let id = item.id;
        self.items.lock().push(item);
        Ok(id)
    }

    async fn enqueue_bulk(&self, items: Vec<SyncItem>) -> DomainResult<Vec<SyncItemId>> {
        let ids = items.iter().map(|i| i.id).collect();
        self.items.lock().extend(items);
        Ok(ids)
    }

    async fn get(&self, id: &SyncItemId) -> DomainResult<Option<SyncItem>> {
        Ok(self.items.lock().iter().find(|i| &i.id == id).cloned())
    }

    async fn list_eligible(
        &self,
        max_batch: usize,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<SyncItem>> {
        Ok(self.items.lock().iter().filter(|i| i.is_eligible(now)).take(max_batch).cloned().collect())
    }

    async fn claim(&self, id: &SyncItemId, now: DateTime<Utc>) -> DomainResult<Option<SyncItem>> {
        let mut items = self.items.lock();
        Ok(items.iter_mut().find(|i| &i.id == id && i.is_eligible(now)).map(|item| {
            item.mark_in_flight(now);
            item.clone()
        }))
    }

    async fn resolve(
        &self,
        id: &SyncItemId,
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> DomainResult<SyncItem> {
        let mut items = self.items.lock();
        let item = items
            .iter_mut()
            .find(|i| &i.id == id)
            .ok_or_else(|| CrmSyncError::NotFound(id.to_string()))?;
        match resolution {
            Resolution::Completed { remote_id } => item.mark_completed(remote_id, now),
            Resolution::Retry { error, next_attempt_at } => item.mark_retryable(&error, next_attempt_at),
            Resolution::Terminal { error } => item.mark_terminal(&error, now),
        }
        Ok(item.clone())
    }

    async fn query(&self, filter: &SyncFilter) -> DomainResult<Vec<SyncItem>> {
        Ok(self.items.lock().iter().filter(|i| filter.matches(i)).cloned().collect())
    }

    async fn counts(&self, filter: &SyncFilter) -> DomainResult<AggregateCounts> {
        Ok(self.items.lock().iter().filter(|i| filter.matches(i)).collect())
    }

    async fn reclaimable(&self, cutoff: DateTime<Utc>) -> DomainResult<Vec<SyncItemId>> {
        Ok(self
            .items
            .lock()
            .iter()
            .filter(|i| i.status.is_terminal() && i.settled_at().is_some_and(|t| t < cutoff))
            .map(|i| i.id)
            .collect())
    }

    async fn remove(&self, ids: &[SyncItemId]) -> DomainResult<usize> {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|i| !ids.contains(&i.id));
        Ok(before - items.len())
    }
}
