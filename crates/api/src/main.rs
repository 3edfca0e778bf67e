//! crmsync - outbound CRM sync daemon
//!
//! Loads configuration, starts the queue processor and reclaimer, and runs
//! until interrupted.

use anyhow::Context;
use crmsync_infra::config;
use crmsync_lib::utils::logging::init_tracing;
use crmsync_lib::AppContext;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging first so .env loading is visible
    init_tracing();

    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => warn!(error = %e, "Could not load .env file"),
    }

    let config = config::load().context("failed to load configuration")?;
    let context = AppContext::new(config).context("failed to build application context")?;

    let providers = context.service.supported_providers();
    let configured: Vec<_> =
        providers.iter().filter(|p| p.configured).map(|p| p.id.to_string()).collect();
    info!(
        tick_interval_secs = context.config.sync.tick_interval_secs,
        worker_pool_size = context.config.sync.worker_pool_size,
        configured = ?configured,
        "crmsync starting"
    );

    context.start_workers().await.context("failed to start workers")?;

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    context.shutdown().await.context("failed to stop workers")?;
    Ok(())
}
