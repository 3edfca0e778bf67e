//! Sync queue commands
//!
//! Ids and correlation keys arrive as strings and are parsed here, so a
//! malformed id is reported as `InvalidItem` rather than `NotFound`.

use crmsync_domain::{
    AggregateCounts, CrmSyncError, EnqueueRequest, ProviderInfo, Result, SyncFilter, SyncItemId,
    SyncItemView,
};
use crmsync_infra::sync::{ReclaimStats, TickReport};
use crmsync_infra::DispatchMetricsSnapshot;

use crate::context::AppContext;
use crate::utils::command_helpers::execute_logged;

pub async fn enqueue_sync_item(ctx: &AppContext, request: EnqueueRequest) -> Result<SyncItemId> {
    execute_logged("sync::enqueue", || ctx.service.enqueue(request)).await
}

/// Enqueue a batch; one invalid entry rejects all of them.
pub async fn enqueue_sync_items(
    ctx: &AppContext,
    requests: Vec<EnqueueRequest>,
) -> Result<Vec<SyncItemId>> {
    execute_logged("sync::enqueue_bulk", || ctx.service.enqueue_bulk(requests)).await
}

pub async fn get_sync_status(ctx: &AppContext, id: &str) -> Result<SyncItemView> {
    execute_logged("sync::get_status", || async {
        let id: SyncItemId = id.parse()?;
        ctx.service.get_status(&id).await
    })
    .await
}

/// Items carrying the `kind:value` correlation key, oldest first.
pub async fn get_sync_status_by_correlation_key(
    ctx: &AppContext,
    key: &str,
) -> Result<Vec<SyncItemView>> {
    execute_logged("sync::get_status_by_correlation_key", || {
        ctx.service.status_by_correlation_key(key)
    })
    .await
}

pub async fn get_sync_summary(
    ctx: &AppContext,
    filter: Option<SyncFilter>,
) -> Result<AggregateCounts> {
    execute_logged("sync::summary", || async { ctx.service.summary(filter.as_ref()).await }).await
}

pub fn list_supported_providers(ctx: &AppContext) -> Vec<ProviderInfo> {
    ctx.service.supported_providers()
}

pub fn is_provider_configured(ctx: &AppContext, provider: &str) -> bool {
    ctx.service.is_configured(provider)
}

/// Run one processor tick now, independent of the background loop.
pub async fn sync_now(ctx: &AppContext) -> Result<TickReport> {
    execute_logged("sync::sync_now", || async {
        let ticker = ctx.processor.lock().await.tick_handle();
        ticker.process_tick().await.map_err(CrmSyncError::from)
    })
    .await
}

/// Run one reclaim pass now.
pub async fn reclaim_now(ctx: &AppContext) -> Result<ReclaimStats> {
    execute_logged("sync::reclaim_now", || async {
        let reclaimer = ctx.reclaimer.lock().await.clone();
        reclaimer.reclaim_once().await
    })
    .await
}

pub fn get_dispatch_metrics(ctx: &AppContext) -> DispatchMetricsSnapshot {
    ctx.metrics.snapshot()
}
