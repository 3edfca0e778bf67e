//! In-memory sync queue store
//!
//! Items live in a hash map keyed by id, with a separate enqueue-sequence
//! index so eligibility scans and queries come back oldest first. All
//! mutation happens under a single `parking_lot::RwLock`; no lock is ever
//! held across an await point.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_core::sync::{Resolution, SyncQueueStore};
use crmsync_domain::{
    AggregateCounts, CrmSyncError, Result, SyncFilter, SyncItem, SyncItemId, SyncStatus,
};
use parking_lot::RwLock;
use tracing::{debug, instrument};

#[derive(Debug)]
struct Entry {
    seq: u64,
    item: SyncItem,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: HashMap<SyncItemId, Entry>,
    order: BTreeMap<u64, SyncItemId>,
    next_seq: u64,
}

impl QueueState {
    fn insert(&mut self, item: SyncItem) -> SyncItemId {
        let id = item.id;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, id);
        self.entries.insert(id, Entry { seq, item });
        id
    }

    fn in_order(&self) -> impl Iterator<Item = &SyncItem> {
        self.order.values().filter_map(|id| self.entries.get(id).map(|entry| &entry.item))
    }
}

/// Process-local [`SyncQueueStore`].
///
/// Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySyncQueue {
    state: RwLock<QueueState>,
}

impl InMemorySyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }
}

fn duplicate(id: &SyncItemId) -> CrmSyncError {
    CrmSyncError::Storage(format!("sync item {id} already queued"))
}

#[async_trait]
impl SyncQueueStore for InMemorySyncQueue {
    async fn enqueue(&self, item: SyncItem) -> Result<SyncItemId> {
        let mut state = self.state.write();
        if state.entries.contains_key(&item.id) {
            return Err(duplicate(&item.id));
        }
        Ok(state.insert(item))
    }

    async fn enqueue_bulk(&self, items: Vec<SyncItem>) -> Result<Vec<SyncItemId>> {
        let mut state = self.state.write();

        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if state.entries.contains_key(&item.id) || !seen.insert(item.id) {
                return Err(duplicate(&item.id));
            }
        }

        Ok(items.into_iter().map(|item| state.insert(item)).collect())
    }

    async fn get(&self, id: &SyncItemId) -> Result<Option<SyncItem>> {
        Ok(self.state.read().entries.get(id).map(|entry| entry.item.clone()))
    }

    async fn list_eligible(&self, max_batch: usize, now: DateTime<Utc>) -> Result<Vec<SyncItem>> {
        let state = self.state.read();
        Ok(state.in_order().filter(|item| item.is_eligible(now)).take(max_batch).cloned().collect())
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn claim(&self, id: &SyncItemId, now: DateTime<Utc>) -> Result<Option<SyncItem>> {
        let mut state = self.state.write();
        let Some(entry) = state.entries.get_mut(id) else {
            return Ok(None);
        };
        if !entry.item.is_eligible(now) {
            debug!(status = %entry.item.status, "Claim lost, item no longer eligible");
            return Ok(None);
        }
        entry.item.mark_in_flight(now);
        Ok(Some(entry.item.clone()))
    }

    #[instrument(skip(self, resolution), fields(item_id = %id))]
    async fn resolve(
        &self,
        id: &SyncItemId,
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> Result<SyncItem> {
        let mut state = self.state.write();
        let entry = state
            .entries
            .get_mut(id)
            .ok_or_else(|| CrmSyncError::NotFound(format!("sync item {id}")))?;

        if entry.item.status != SyncStatus::InFlight {
            return Err(CrmSyncError::Storage(format!(
                "sync item {id} is {} and cannot be resolved",
                entry.item.status
            )));
        }

        match resolution {
            Resolution::Completed { remote_id } => entry.item.mark_completed(remote_id, now),
            Resolution::Retry { error, next_attempt_at } => {
                entry.item.mark_retryable(&error, next_attempt_at);
            }
            Resolution::Terminal { error } => entry.item.mark_terminal(&error, now),
        }
        Ok(entry.item.clone())
    }

    async fn query(&self, filter: &SyncFilter) -> Result<Vec<SyncItem>> {
        let state = self.state.read();
        Ok(state.in_order().filter(|item| filter.matches(item)).cloned().collect())
    }

    async fn counts(&self, filter: &SyncFilter) -> Result<AggregateCounts> {
        let state = self.state.read();
        Ok(state.in_order().filter(|item| filter.matches(item)).collect())
    }

    async fn reclaimable(&self, cutoff: DateTime<Utc>) -> Result<Vec<SyncItemId>> {
        let state = self.state.read();
        Ok(state
            .in_order()
            .filter(|item| item.status.is_terminal())
            .filter(|item| item.settled_at().is_some_and(|at| at < cutoff))
            .map(|item| item.id)
            .collect())
    }

    async fn remove(&self, ids: &[SyncItemId]) -> Result<usize> {
        let mut state = self.state.write();
        let mut removed = 0;
        for id in ids {
            if let Some(entry) = state.entries.remove(id) {
                state.order.remove(&entry.seq);
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use crmsync_domain::{EnqueueRequest, RecordKind};
    use serde_json::json;

    use super::*;

    fn item(n: u32, now: DateTime<Utc>) -> SyncItem {
        let request = EnqueueRequest::new(RecordKind::Lead, "zoho", json!({ "leadId": n }))
            .validate()
            .unwrap();
        SyncItem::new(request, 3, now)
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let queue = InMemorySyncQueue::new();
        let first = item(1, Utc::now());
        queue.enqueue(first.clone()).await.unwrap();

        assert!(matches!(queue.enqueue(first.clone()).await, Err(CrmSyncError::Storage(_))));
        let second = item(2, Utc::now());
        assert!(queue.enqueue_bulk(vec![second, first]).await.is_err());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn eligible_items_come_back_in_enqueue_order() {
        let queue = InMemorySyncQueue::new();
        let now = Utc::now();
        let ids = queue.enqueue_bulk((0..6).map(|n| item(n, now)).collect()).await.unwrap();

        let batch = queue.list_eligible(4, now).await.unwrap();
        let batch_ids: Vec<_> = batch.iter().map(|i| i.id).collect();
        assert_eq!(batch_ids, ids[..4]);
    }

    #[tokio::test]
    async fn future_retries_are_not_eligible() {
        let queue = InMemorySyncQueue::new();
        let now = Utc::now();
        let id = queue.enqueue(item(1, now)).await.unwrap();

        queue.claim(&id, now).await.unwrap().unwrap();
        queue
            .resolve(
                &id,
                Resolution::Retry { error: "503".into(), next_attempt_at: now + Duration::seconds(60) },
                now,
            )
            .await
            .unwrap();

        assert!(queue.list_eligible(10, now).await.unwrap().is_empty());
        assert_eq!(queue.list_eligible(10, now + Duration::seconds(60)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_claims_yield_one_winner() {
        let queue = Arc::new(InMemorySyncQueue::new());
        let now = Utc::now();
        let id = queue.enqueue(item(1, now)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move { queue.claim(&id, now).await.unwrap() }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        let stored = queue.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, SyncStatus::InFlight);
        assert_eq!(stored.attempts, 1);
    }

    #[tokio::test]
    async fn resolve_requires_in_flight() {
        let queue = InMemorySyncQueue::new();
        let now = Utc::now();
        let id = queue.enqueue(item(1, now)).await.unwrap();

        let err = queue
            .resolve(&id, Resolution::Completed { remote_id: "r".into() }, now)
            .await
            .unwrap_err();
        assert!(matches!(err, CrmSyncError::Storage(_)));

        let missing = queue
            .resolve(&SyncItemId::new(), Resolution::Terminal { error: "x".into() }, now)
            .await
            .unwrap_err();
        assert!(matches!(missing, CrmSyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn reclaim_only_touches_old_terminal_items() {
        let queue = InMemorySyncQueue::new();
        let start = Utc::now();
        let done = queue.enqueue(item(1, start)).await.unwrap();
        let failed = queue.enqueue(item(2, start)).await.unwrap();
        let waiting = queue.enqueue(item(3, start)).await.unwrap();

        queue.claim(&done, start).await.unwrap();
        queue.resolve(&done, Resolution::Completed { remote_id: "00T1".into() }, start).await.unwrap();
        queue.claim(&failed, start).await.unwrap();
        queue.resolve(&failed, Resolution::Terminal { error: "400".into() }, start).await.unwrap();

        let cutoff = start + Duration::seconds(1);
        let ids = queue.reclaimable(cutoff).await.unwrap();
        assert_eq!(ids, vec![done, failed]);
        assert!(queue.reclaimable(start).await.unwrap().is_empty());

        assert_eq!(queue.remove(&ids).await.unwrap(), 2);
        assert_eq!(queue.remove(&ids).await.unwrap(), 0);
        assert!(queue.get(&waiting).await.unwrap().is_some());
        assert_eq!(queue.len(), 1);
    }
}
