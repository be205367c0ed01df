//! Service runtime: wiring, task supervision, graceful shutdown.
//!
//! The [`Runtime`] is the process-wide coordinator (no free-standing
//! module state): it owns the settings, the connection pools, the
//! explorer client, and every long-running component, and it cascades
//! shutdown through a single [`CancellationToken`].
//!
//! # Shutdown Sequence
//!
//! On SIGINT/SIGTERM:
//! 1. Stop new work acquisition (token cancelled)
//! 2. In-flight batches finish at their next page boundary
//! 3. Cursor updates flush with the last committed page
//! 4. Pools close; the process exits

use std::sync::Arc;

use routescan_client::RoutescanClient;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::backfill::Orchestrator;
use crate::config::Settings;
use crate::enrichment::{
    EnrichmentListener, GapFiller, PgNotificationSource, PollingNotificationSource,
};
use crate::error::{AppError, Result};
use crate::ingest::{Ingestor, IngestorConfig, RpcScanner};
use crate::jobs::JobQueue;
use crate::poller::AdaptivePoller;
use crate::ports::NotificationSource;
use crate::store::PostgresStore;

// ═══════════════════════════════════════════════════════════════════════════════
// RUNTIME
// ═══════════════════════════════════════════════════════════════════════════════

/// The assembled service.
#[derive(Debug)]
pub struct Runtime {
    settings: Settings,
    store: Arc<PostgresStore>,
    gap_store: Arc<PostgresStore>,
    orchestrator: Arc<Orchestrator>,
    poller: Arc<AdaptivePoller>,
    listener: Arc<EnrichmentListener>,
    gap_filler: Arc<GapFiller>,
}

impl Runtime {
    /// Connect pools and wire every component from settings.
    ///
    /// # Errors
    ///
    /// Returns an error when settings are invalid or a connection cannot
    /// be established.
    pub async fn build(settings: Settings) -> Result<Self> {
        if let Err(errors) = settings.validate() {
            return Err(AppError::Config(errors.join("; ")));
        }

        let store = Arc::new(PostgresStore::connect(&settings.database).await?);

        // The gap filler runs on one shared pool of its own, sized at two
        // connections per worker, so backlog sweeps cannot exhaust
        // storage shared memory.
        let gap_connections =
            u32::try_from(settings.enrichment.workers.saturating_mul(2).max(2)).unwrap_or(2);
        let gap_store =
            Arc::new(PostgresStore::connect_small(&settings.database, gap_connections).await?);

        let client = RoutescanClient::with_config(
            settings.explorer.base_url.clone(),
            settings.explorer.client_config(),
        )
        .map_err(|e| AppError::Initialization(format!("explorer client: {e}")))?;
        let feed = Arc::new(client);

        let ingestor_config =
            IngestorConfig::from_settings(&settings.explorer, &settings.backfill, &settings.poller);
        let default_chain_id = ingestor_config.default_chain_id;

        let mut ingestor = Ingestor::new(
            feed.clone(),
            store.clone(),
            store.clone(),
            ingestor_config,
        );
        if settings.rpc.enabled {
            let scanner = RpcScanner::from_settings(
                &settings.rpc,
                store.clone(),
                store.clone(),
                default_chain_id,
            )?;
            ingestor = ingestor.with_rpc_scanner(Arc::new(scanner));
        }
        let ingestor = Arc::new(ingestor);

        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            ingestor.clone(),
            settings.backfill.clone(),
        ));

        let poller = Arc::new(AdaptivePoller::new(
            store.clone(),
            store.clone(),
            ingestor.clone(),
            settings.poller.clone(),
        ));

        let listener = Arc::new(EnrichmentListener::new(
            feed.clone(),
            store.clone(),
            store.clone(),
            settings.enrichment.clone(),
        ));

        let gap_filler = Arc::new(GapFiller::new(
            feed,
            gap_store.clone(),
            gap_store.clone(),
            settings.enrichment.clone(),
        ));

        Ok(Self {
            settings,
            store,
            gap_store,
            orchestrator,
            poller,
            listener,
            gap_filler,
        })
    }

    /// The primary store (operator CLI operations).
    #[must_use]
    pub fn store(&self) -> Arc<PostgresStore> {
        self.store.clone()
    }

    /// A job queue facade over the primary store.
    #[must_use]
    pub fn job_queue(&self) -> JobQueue {
        JobQueue::new(
            self.store.clone(),
            self.store.clone(),
            self.settings.backfill.job_max_attempts,
        )
    }

    /// Run database migrations on the primary pool.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        self.store.run_migrations().await
    }

    /// Run the service until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error when a component cannot start (e.g., the
    /// notification listener cannot connect).
    pub async fn run(self) -> Result<()> {
        self.install_metrics_exporter();

        let shutdown = CancellationToken::new();
        let mut handles: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

        handles.push((
            "backfill-orchestrator",
            tokio::spawn(self.orchestrator.clone().run(shutdown.clone())),
        ));
        handles.push((
            "adaptive-poller",
            tokio::spawn(self.poller.clone().run(shutdown.clone())),
        ));

        let source: Box<dyn NotificationSource> = if self.settings.enrichment.use_polling_fallback {
            Box::new(PollingNotificationSource::new(
                self.store.clone(),
                self.store.clone(),
                self.settings.enrichment.poll_interval(),
            ))
        } else {
            Box::new(
                PgNotificationSource::connect(
                    self.store.pool(),
                    &self.settings.enrichment.channel,
                )
                .await?,
            )
        };
        handles.push((
            "enrichment-listener",
            tokio::spawn(self.listener.clone().run(source, shutdown.clone())),
        ));
        handles.push((
            "gap-filler",
            tokio::spawn(self.gap_filler.clone().run(shutdown.clone())),
        ));

        info!("All components started");
        wait_for_shutdown_signal().await;
        info!("Shutdown signal received, draining");
        shutdown.cancel();

        for (name, handle) in handles {
            match tokio::time::timeout(std::time::Duration::from_secs(30), handle).await {
                Ok(Ok(())) => info!(component = name, "Component stopped"),
                Ok(Err(e)) => error!(component = name, error = %e, "Component panicked"),
                Err(_) => warn!(component = name, "Component did not stop in time"),
            }
        }

        self.store.pool().close().await;
        self.gap_store.pool().close().await;
        info!("Shutdown complete");
        Ok(())
    }

    /// Start the Prometheus exporter when enabled.
    fn install_metrics_exporter(&self) {
        if !self.settings.metrics.enabled {
            return;
        }

        let addr = self.settings.metrics.socket_addr();
        match addr.parse::<std::net::SocketAddr>() {
            Ok(socket) => {
                let builder =
                    metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(socket);
                if let Err(e) = builder.install() {
                    warn!(error = %e, "Failed to install metrics exporter");
                } else {
                    info!(%addr, "Metrics exporter listening");
                }
            }
            Err(e) => warn!(%addr, error = %e, "Invalid metrics address"),
        }
    }
}

/// Block until SIGINT or SIGTERM.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
