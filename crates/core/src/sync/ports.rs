//! Port interfaces for sync operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_domain::{
    AggregateCounts, DispatchError, ProviderDescriptor, RecordKind, Result, SyncFilter, SyncItem,
    SyncItemId, SyncPayload,
};
use serde::Serialize;
use serde_json::Value;

/// How an in-flight item leaves the `in-flight` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Provider accepted the record.
    Completed { remote_id: String },
    /// Failed, eligible again from `next_attempt_at`.
    Retry { error: String, next_attempt_at: DateTime<Utc> },
    /// Failed for good.
    Terminal { error: String },
}

/// Storage for sync items and their lifecycle status.
///
/// Implementations must make `claim` atomic: two concurrent claims of the
/// same id yield at most one `Some`.
#[async_trait]
pub trait SyncQueueStore: Send + Sync {
    /// Insert a new item. Fails if the id is already present.
    async fn enqueue(&self, item: SyncItem) -> Result<SyncItemId>;

    /// Insert several items; either all land or none do.
    async fn enqueue_bulk(&self, items: Vec<SyncItem>) -> Result<Vec<SyncItemId>>;

    async fn get(&self, id: &SyncItemId) -> Result<Option<SyncItem>>;

    /// Up to `max_batch` eligible items at `now`, oldest enqueue first.
    async fn list_eligible(&self, max_batch: usize, now: DateTime<Utc>) -> Result<Vec<SyncItem>>;

    /// Move an eligible item to `in-flight` and count the attempt.
    ///
    /// Returns `None` when the item is gone or no longer eligible.
    async fn claim(&self, id: &SyncItemId, now: DateTime<Utc>) -> Result<Option<SyncItem>>;

    /// Apply the outcome of a dispatch to an `in-flight` item.
    async fn resolve(
        &self,
        id: &SyncItemId,
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> Result<SyncItem>;

    async fn query(&self, filter: &SyncFilter) -> Result<Vec<SyncItem>>;

    /// Count items matching `filter` per status.
    async fn counts(&self, filter: &SyncFilter) -> Result<AggregateCounts>;

    /// Ids of terminal items settled strictly before `cutoff`.
    async fn reclaimable(&self, cutoff: DateTime<Utc>) -> Result<Vec<SyncItemId>>;

    /// Delete items; returns how many were present.
    async fn remove(&self, ids: &[SyncItemId]) -> Result<usize>;
}

/// Provider-specific request produced by [`ProviderAdapter::map_payload`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderRequest {
    /// Remote object or module name (`Task`, `contacts`, `Deals`, ...).
    pub object: String,
    pub body: Value,
    /// Forwarded to providers that deduplicate on a client key.
    pub idempotency_key: Option<String>,
}

impl ProviderRequest {
    pub fn new(object: impl Into<String>, body: Value) -> Self {
        Self { object: object.into(), body, idempotency_key: None }
    }

    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Strategy that moves a sync item into one CRM.
///
/// Adapters never see or mutate the queued item itself, only its kind and
/// payload snapshot.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Whether credentials are present at all.
    fn is_configured(&self) -> bool;

    /// Obtain or refresh credentials.
    async fn authenticate(&self) -> std::result::Result<(), DispatchError>;

    /// Translate a payload into the provider wire format. Pure.
    fn map_payload(
        &self,
        kind: RecordKind,
        payload: &SyncPayload,
    ) -> std::result::Result<ProviderRequest, DispatchError>;

    /// Perform the remote call; returns the provider-assigned id.
    async fn send(&self, request: ProviderRequest) -> std::result::Result<String, DispatchError>;
}
