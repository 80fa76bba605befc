// Scriptable stub upstream service for integration tests.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What the stub's /health endpoint answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthMode {
    /// 200 {"status":"healthy","checks":{"database":"healthy"}}
    Healthy,
    /// 200 {"status":"degraded","checks":{"database":"healthy","cache":"unhealthy"}}
    Degraded,
    /// 200 {"status":"unhealthy"}
    Unhealthy,
    /// 500 with an empty body
    Error,
    /// 200 with a non-JSON body
    Malformed,
    /// Sleeps far beyond any probe timeout before answering
    Hang,
}

/// One in-process service with a scriptable health surface.
pub struct StubService {
    addr: SocketAddr,
    mode: Arc<Mutex<HealthMode>>,
    hits: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl StubService {
    pub async fn start(initial: HealthMode) -> Self {
        let mode = Arc::new(Mutex::new(initial));
        let hits = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub local addr");

        let handler_mode = mode.clone();
        let handler_hits = hits.clone();
        let router = Router::new().route(
            "/health",
            get(move || {
                let mode = handler_mode.clone();
                let hits = handler_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::Relaxed);
                    let current = *mode.lock().unwrap();
                    Self::respond(current).await
                }
            }),
        );

        let serve_token = shutdown.clone();
        let handle = tokio::task::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    serve_token.cancelled().await;
                })
                .await;
        });

        Self {
            addr,
            mode,
            hits,
            shutdown,
            handle,
        }
    }

    async fn respond(mode: HealthMode) -> axum::response::Response {
        match mode {
            HealthMode::Healthy => (
                StatusCode::OK,
                axum::Json(json!({
                    "status": "healthy",
                    "checks": { "database": "healthy" },
                })),
            )
                .into_response(),
            HealthMode::Degraded => (
                StatusCode::OK,
                axum::Json(json!({
                    "status": "degraded",
                    "checks": { "database": "healthy", "cache": "unhealthy" },
                })),
            )
                .into_response(),
            HealthMode::Unhealthy => (
                StatusCode::OK,
                axum::Json(json!({ "status": "unhealthy" })),
            )
                .into_response(),
            HealthMode::Error => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            HealthMode::Malformed => (StatusCode::OK, "definitely not json").into_response(),
            HealthMode::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                StatusCode::OK.into_response()
            }
        }
    }

    /// Base URL the registry should carry for this stub.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_mode(&self, mode: HealthMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Number of /health requests served so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}
