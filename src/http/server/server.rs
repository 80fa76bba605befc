//! HTTP server implementation.

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

use crate::config::{Config, ConfigTrait};
use crate::controller::controller::Controller;
use crate::middleware::middleware::Middleware;

const DEFAULT_PORT: &str = "8030";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Server trait for HTTP server operations.
#[async_trait::async_trait]
pub trait Server: Send + Sync {
    /// Starts the server (blocking).
    async fn listen_and_serve(&self) -> Result<()>;
}

/// HTTP server implementation.
pub struct HttpServer {
    shutdown_token: CancellationToken,
    config: Config,
    router: Router,
}

impl HttpServer {
    /// Creates a new HTTP server.
    pub fn new(
        shutdown_token: CancellationToken,
        config: Config,
        controllers: Vec<Box<dyn Controller>>,
        middlewares: Vec<Box<dyn Middleware>>,
    ) -> Result<Arc<Self>> {
        let router = Self::build_router(controllers);
        let router = Self::merge_middlewares(router, middlewares);

        Ok(Arc::new(Self {
            shutdown_token,
            config,
            router,
        }))
    }

    /// Starts the HTTP server (async version).
    pub async fn listen_and_serve(&self) -> Result<()> {
        let name = self
            .config
            .api()
            .and_then(|api| api.name.as_deref())
            .unwrap_or("svcdisco");
        let port = self
            .config
            .api()
            .and_then(|api| api.port.as_deref())
            .unwrap_or(DEFAULT_PORT);

        let port = port.trim_start_matches(':');
        let addr: SocketAddr = format!("0.0.0.0:{}", port)
            .parse()
            .context("Failed to parse server address")?;

        info!(
            component = "server",
            event = "started",
            name = name,
            port = port,
            "server started"
        );

        let listener = TcpListener::bind(&addr)
            .await
            .context("Failed to bind TCP listener")?;

        let shutdown_token = self.shutdown_token.clone();
        let serve_future =
            axum::serve(listener, self.router.clone()).with_graceful_shutdown(async move {
                shutdown_token.cancelled().await;
            });

        if let Err(e) = serve_future.await {
            error!(
                component = "server",
                event = "listen_and_serve_failed",
                name = name,
                port = port,
                error = %e,
                "server failed to listen and serve"
            );
            return Err(e.into());
        }

        info!(
            component = "server",
            event = "stopped",
            name = name,
            port = port,
            "server stopped"
        );

        Ok(())
    }

    /// Builds the router with all controllers.
    fn build_router(controllers: Vec<Box<dyn Controller>>) -> Router {
        let mut router = Router::new();
        for controller in controllers {
            router = controller.add_route(router);
        }
        router
    }

    /// Merges middlewares into the router, last middleware wrapping first.
    fn merge_middlewares(router: Router, middlewares: Vec<Box<dyn Middleware>>) -> Router {
        let mut result = router;
        for middleware in middlewares.iter().rev() {
            result = middleware.apply(result);
        }
        result.layer(TimeoutLayer::new(REQUEST_TIMEOUT))
    }
}

#[async_trait::async_trait]
impl Server for HttpServer {
    async fn listen_and_serve(&self) -> Result<()> {
        HttpServer::listen_and_serve(self).await
    }
}

#[async_trait::async_trait]
impl Server for Arc<HttpServer> {
    async fn listen_and_serve(&self) -> Result<()> {
        HttpServer::listen_and_serve(self).await
    }
}
