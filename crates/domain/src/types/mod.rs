//! Domain types and models

pub mod provider;
pub mod records;
pub mod sync_item;

pub use provider::{ProviderDescriptor, ProviderId, ProviderInfo};
pub use records::{CallDirection, CallLogRecord, LeadRecord, OpportunityRecord};
pub use sync_item::{
    truncate_error, AggregateCounts, CorrelationKey, EnqueueRequest, RecordKind, SyncAction,
    SyncFilter, SyncItem, SyncItemId, SyncItemView, SyncPayload, SyncStatus, ValidatedRequest,
};
