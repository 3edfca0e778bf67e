//! Command surface over the sync queue
//!
//! Thin, logged wrappers that front-ends (HTTP, IPC, CLI) call with an
//! [`AppContext`](crate::AppContext).

pub mod health;
pub mod sync;

pub use health::get_app_health;
pub use sync::{
    enqueue_sync_item, enqueue_sync_items, get_dispatch_metrics, get_sync_status,
    get_sync_status_by_correlation_key, get_sync_summary, is_provider_configured,
    list_supported_providers, reclaim_now, sync_now,
};
