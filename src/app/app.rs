// Main discovery application implementation.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigTrait};
use crate::coordinator::{Coordinator, StartupSequencer};
use crate::graph::DependencyGraph;
use crate::http::client::create_client;
use crate::liveness;
use crate::probe::{HttpProber, ProbeScheduler, Prober};
use crate::registry::ServiceRegistry;

use super::server::HttpServer;

const HEALTH_EVENT_CAPACITY: usize = 256;

/// Encapsulates the entire discovery application state.
///
/// One instance owns the registry, coordinator, probe scheduler and API
/// server; it is created at process start and passed explicitly to every
/// consumer. `serve` starts everything, `close` stops all probe loops.
pub struct App {
    shutdown_token: CancellationToken,
    coordinator: Arc<Coordinator>,
    scheduler: Arc<ProbeScheduler>,
    sequencer: Arc<StartupSequencer>,
    probe: Arc<liveness::Probe>,
    server: Arc<HttpServer>,
}

impl App {
    /// Creates a new discovery application instance. Configuration is
    /// already validated at this point; graph construction re-checks
    /// acyclicity as a safety net.
    pub async fn new(
        shutdown_token: CancellationToken,
        cfg: Config,
        probe: Arc<liveness::Probe>,
    ) -> Result<Self> {
        let registry = Arc::new(ServiceRegistry::from_config(&cfg));
        let graph = DependencyGraph::from_config(&cfg)
            .context("failed to build dependency graph from configuration")?;

        let (events, _) = broadcast::channel(HEALTH_EVENT_CAPACITY);

        let coordinator = Coordinator::new(registry.clone(), graph, events.clone());

        let prober =
            Arc::new(HttpProber::new(create_client(), cfg.probe_timeout())) as Arc<dyn Prober>;
        let scheduler = ProbeScheduler::new(
            shutdown_token.clone(),
            registry,
            prober,
            cfg.probe_interval(),
            cfg.failure_threshold(),
            events,
        );

        let sequencer = StartupSequencer::new(coordinator.clone(), cfg.wave_timeout());

        let server = Arc::new(HttpServer::new(
            shutdown_token.clone(),
            cfg,
            coordinator.clone(),
            sequencer.clone(),
            probe.clone(),
        )?);

        Ok(Self {
            shutdown_token,
            coordinator,
            scheduler,
            sequencer,
            probe,
            server,
        })
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Starts probing, the startup sequencer and the API server, and
    /// handles graceful shutdown.
    pub async fn serve(&self, gsh: Arc<crate::shutdown::GracefulShutdown>) -> Result<()> {
        // Register liveness target before serving.
        self.probe
            .watch(vec![Arc::new(self.clone()) as Arc<dyn liveness::Service>]);

        self.scheduler.start();

        // The sequencer pass runs in the background: a failed wave is an
        // operator problem, never a reason to keep the API down.
        let sequencer = self.sequencer.clone();
        tokio::task::spawn(async move {
            let report = sequencer.run().await;
            let failed: Vec<&String> = report
                .phases
                .iter()
                .filter(|(_, phase)| **phase == crate::coordinator::StartupPhase::Failed)
                .map(|(name, _)| name)
                .collect();
            if failed.is_empty() {
                info!(
                    component = "app",
                    event = "startup_sequence_complete",
                    waves = report.waves.len(),
                    "all services came up in dependency order"
                );
            } else {
                warn!(
                    component = "app",
                    event = "startup_sequence_incomplete",
                    failed = ?failed,
                    "startup sequence finished with failed services"
                );
            }
        });

        let server = self.server.clone();
        let app_for_close = self.clone();
        let gsh_clone = gsh.clone();

        tokio::task::spawn(async move {
            if let Err(e) = server.listen_and_serve().await {
                error!(
                    component = "app",
                    scope = "server",
                    event = "serve_failed",
                    error = %e,
                    "server failed to serve"
                );
            }

            if let Err(e) = app_for_close.close().await {
                error!(
                    component = "app",
                    scope = "shutdown",
                    event = "close_failed",
                    error = %e,
                    "application close failed"
                );
            }

            gsh_clone.done();
        });

        info!(component = "app", event = "started", "application lifecycle");

        Ok(())
    }

    /// Checks whether the HTTP server is still alive.
    pub fn is_alive(&self) -> bool {
        if !self.server.is_alive() {
            warn!(
                component = "app",
                scope = "http_server",
                event = "gone_away",
                "http server has gone away"
            );
            return false;
        }
        true
    }

    /// Closes application resources: cancelling the token stops every
    /// probe loop and the server together.
    pub async fn close(&self) -> Result<()> {
        self.shutdown_token.cancel();
        info!(component = "app", event = "stopped", "application lifecycle");
        Ok(())
    }
}

impl Clone for App {
    fn clone(&self) -> Self {
        Self {
            shutdown_token: self.shutdown_token.clone(),
            coordinator: self.coordinator.clone(),
            scheduler: self.scheduler.clone(),
            sequencer: self.sequencer.clone(),
            probe: self.probe.clone(),
            server: self.server.clone(),
        }
    }
}

/// AppService implements liveness::Service for the App
impl liveness::Service for App {
    fn is_alive(&self, _timeout: Duration) -> bool {
        self.is_alive()
    }
}
