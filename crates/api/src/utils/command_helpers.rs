//! Command execution helpers
//!
//! Every command goes through [`execute_logged`] so timing and outcome are
//! logged the same way everywhere.

use std::future::Future;
use std::time::Instant;

use crmsync_domain::Result as DomainResult;

use crate::utils::logging::log_command_execution;

/// Run a command body, then log its duration and outcome.
///
/// # Example
///
/// ```rust,ignore
/// pub async fn get_sync_status(ctx: &AppContext, id: &SyncItemId) -> Result<SyncItemView> {
///     execute_logged("sync::get_status", || async { ctx.service.get_status(id).await }).await
/// }
/// ```
pub async fn execute_logged<F, Fut, T>(command_name: &str, command_fn: F) -> DomainResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    let start = Instant::now();
    let result = command_fn().await;
    log_command_execution(command_name, start.elapsed(), result.as_ref().err());
    result
}
