// HTTP server composition for the discovery application.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ConfigTrait};
use crate::coordinator::{Coordinator, StartupSequencer};
use crate::http::{Controller, Middleware, Server as HttpServerTrait};
use crate::liveness;

/// HTTP server wrapper that assembles controllers and middlewares.
pub struct HttpServer {
    #[allow(dead_code)]
    ctx: CancellationToken,
    server: Arc<dyn HttpServerTrait>,
    is_server_alive: Arc<AtomicBool>,
}

impl HttpServer {
    pub fn new(
        ctx: CancellationToken,
        cfg: Config,
        coordinator: Arc<Coordinator>,
        sequencer: Arc<StartupSequencer>,
        probe: Arc<liveness::Probe>,
    ) -> Result<Self> {
        let server = Self::make_http_server(ctx.clone(), cfg, coordinator, sequencer, probe)?;

        Ok(Self {
            ctx,
            server,
            is_server_alive: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Returns true while listen_and_serve is running.
    pub fn is_alive(&self) -> bool {
        self.is_server_alive.load(Ordering::Relaxed)
    }

    /// Starts the HTTP server (blocking call).
    pub async fn listen_and_serve(&self) -> Result<()> {
        self.is_server_alive.store(true, Ordering::Relaxed);
        let result = self.server.listen_and_serve().await;
        self.is_server_alive.store(false, Ordering::Relaxed);
        result
    }

    fn make_http_server(
        ctx: CancellationToken,
        cfg: Config,
        coordinator: Arc<Coordinator>,
        sequencer: Arc<StartupSequencer>,
        probe: Arc<liveness::Probe>,
    ) -> Result<Arc<dyn HttpServerTrait>> {
        let controllers = Self::controllers(&cfg, coordinator, sequencer, probe);
        let middlewares = Self::middlewares();

        let server = crate::http::HttpServer::new(ctx, cfg, controllers, middlewares)?;
        Ok(server as Arc<dyn HttpServerTrait>)
    }

    /// Returns all HTTP controllers for the server.
    fn controllers(
        cfg: &Config,
        coordinator: Arc<Coordinator>,
        sequencer: Arc<StartupSequencer>,
        probe: Arc<liveness::Probe>,
    ) -> Vec<Box<dyn Controller>> {
        use crate::controller;

        let gateway = cfg.gateway_addr().map(|s| s.to_string());

        vec![
            // Healthcheck probe endpoint
            Box::new(controller::LivenessProbeController::new(probe)),
            // Metrics endpoint
            Box::new(controller::PrometheusMetricsController::new()),
            // Registry contents with aggregate health
            Box::new(controller::ServicesController::new(
                coordinator.clone(),
                gateway.clone(),
            )),
            // Round-robin endpoint selection
            Box::new(controller::AddressController::new(
                coordinator.clone(),
                gateway,
            )),
            // Readiness queries, optionally blocking
            Box::new(controller::ReadyController::new(coordinator.clone())),
            // Dynamic instance registration
            Box::new(controller::RegisterController::new(coordinator)),
            // Startup sequencer report
            Box::new(controller::StartupReportController::new(sequencer)),
        ]
    }

    /// Returns the request middlewares for the server.
    fn middlewares() -> Vec<Box<dyn Middleware>> {
        vec![Box::new(crate::middleware::TraceMiddleware::new())]
    }
}
