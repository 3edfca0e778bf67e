//! Application context - dependency injection container

use std::sync::Arc;

use crmsync_common::time::{Clock, SystemClock};
use crmsync_core::sync::{ProviderRegistry, RetryPolicies, SyncQueueStore, SyncService};
use crmsync_domain::{Config, CrmSyncError, Result};
use crmsync_infra::{
    build_registry, DispatchMetrics, HttpClient, InMemorySyncQueue, ProcessorConfig,
    QueueProcessor, Reclaimer, ReclaimerConfig, WorkerError,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::utils::health::{ComponentHealth, HealthStatus};

/// Application context - holds the queue, services and workers
pub struct AppContext {
    pub config: Config,
    pub service: Arc<SyncService>,
    pub registry: Arc<ProviderRegistry>,
    pub queue: Arc<InMemorySyncQueue>,
    pub metrics: Arc<DispatchMetrics>,
    pub(crate) processor: Mutex<QueueProcessor>,
    pub(crate) reclaimer: Mutex<Reclaimer>,
}

impl AppContext {
    /// Build the context on the system clock with real provider adapters.
    pub fn new(config: Config) -> Result<Self> {
        let http = HttpClient::new()?;
        let registry = build_registry(&config.providers, &http);
        Self::with_parts(config, registry, Arc::new(SystemClock))
    }

    /// Build the context around a prepared registry and clock.
    ///
    /// Tests use this to inject scripted adapters and a mock clock.
    pub fn with_parts(
        config: Config,
        registry: ProviderRegistry,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(registry);
        let policies = Arc::new(RetryPolicies::from_config(&config.sync.retry, &config.providers));
        let queue = Arc::new(InMemorySyncQueue::new());
        let store: Arc<dyn SyncQueueStore> = queue.clone();
        let metrics = Arc::new(DispatchMetrics::new());

        let service = Arc::new(SyncService::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&policies),
            Arc::clone(&clock),
        ));

        let processor = QueueProcessor::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            policies,
            Arc::clone(&clock),
            ProcessorConfig::from(&config.sync),
            Arc::clone(&metrics),
        );

        let reclaimer = Reclaimer::new(store, clock, ReclaimerConfig::from(&config.reclaim))
            .with_metrics(Arc::clone(&metrics));

        Ok(Self {
            config,
            service,
            registry,
            queue,
            metrics,
            processor: Mutex::new(processor),
            reclaimer: Mutex::new(reclaimer),
        })
    }

    /// Start the background workers enabled in the configuration.
    pub async fn start_workers(&self) -> Result<()> {
        if self.config.sync.enabled {
            self.processor.lock().await.start()?;
        } else {
            info!("queue processor disabled by configuration");
        }

        if self.config.reclaim.enabled {
            self.reclaimer.lock().await.start().await?;
        } else {
            info!("reclaimer disabled by configuration");
        }

        Ok(())
    }

    /// Stop running workers and wait for in-flight dispatches.
    ///
    /// Safe to call more than once; workers that are not running are skipped.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutdown called on AppContext");

        let processor_result = match self.processor.lock().await.stop().await {
            Ok(()) | Err(WorkerError::NotRunning(_)) => Ok(()),
            Err(err) => {
                warn!(error = %err, "queue processor did not stop cleanly");
                Err(CrmSyncError::from(err))
            }
        };

        let reclaimer_result = match self.reclaimer.lock().await.stop().await {
            Ok(()) | Err(WorkerError::NotRunning(_)) => Ok(()),
            Err(err) => {
                warn!(error = %err, "reclaimer did not stop cleanly");
                Err(CrmSyncError::from(err))
            }
        };

        let snapshot = self.metrics.snapshot();
        info!(
            completed = snapshot.completed,
            failed_terminal = snapshot.failed_terminal,
            reclaimed = snapshot.reclaimed,
            "AppContext shut down"
        );

        processor_result.and(reclaimer_result)
    }

    pub async fn is_processor_running(&self) -> bool {
        self.processor.lock().await.is_running()
    }

    pub async fn is_reclaimer_running(&self) -> bool {
        self.reclaimer.lock().await.is_running().await
    }

    /// Check health of the queue, workers and provider configuration
    ///
    /// A worker disabled in the configuration counts as healthy; an enabled
    /// worker that is not running does not.
    pub async fn health_check(&self) -> HealthStatus {
        let mut status = HealthStatus::new();

        status = status.add_component(match self.service.summary(None).await {
            Ok(counts) => ComponentHealth::healthy_with(
                "queue",
                format!("{} items, {} pending", counts.total, counts.pending),
            ),
            Err(err) => ComponentHealth::unhealthy("queue", err.to_string()),
        });

        status = status.add_component(worker_health(
            "processor",
            self.config.sync.enabled,
            self.is_processor_running().await,
        ));
        status = status.add_component(worker_health(
            "reclaimer",
            self.config.reclaim.enabled,
            self.is_reclaimer_running().await,
        ));

        let configured = self.registry.supported_providers().into_iter().filter(|p| p.configured).count();
        status = status.add_component(if configured > 0 {
            ComponentHealth::healthy_with("providers", format!("{configured} configured"))
        } else {
            ComponentHealth::unhealthy("providers", "no provider has credentials")
        });

        status.calculate_score();
        status
    }
}

fn worker_health(name: &str, enabled: bool, running: bool) -> ComponentHealth {
    match (enabled, running) {
        (false, _) => ComponentHealth::healthy_with(name, "disabled"),
        (true, true) => ComponentHealth::healthy(name),
        (true, false) => ComponentHealth::unhealthy(name, "not running"),
    }
}
