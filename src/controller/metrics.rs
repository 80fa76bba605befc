//! Metrics controller.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::sync::OnceLock;

use crate::http::Controller;

pub const PROMETHEUS_METRICS_PATH: &str = "/metrics";

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Initializes the Prometheus metrics exporter.
/// Must be called BEFORE the tokio runtime starts to avoid runtime
/// conflicts inside the recorder installation.
pub fn init_prometheus_exporter() -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("Prometheus handle already initialized"))?;

    Ok(())
}

/// PrometheusMetricsController handles the Prometheus scrape endpoint.
pub struct PrometheusMetricsController;

impl PrometheusMetricsController {
    pub fn new() -> Self {
        Self
    }

    async fn get_metrics() -> impl IntoResponse {
        if let Some(handle) = PROMETHEUS_HANDLE.get() {
            return (
                StatusCode::OK,
                [("content-type", "text/plain; charset=utf-8")],
                handle.render(),
            );
        }

        (
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            "# metrics recorder is not installed\n".to_string(),
        )
    }
}

impl Default for PrometheusMetricsController {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller for PrometheusMetricsController {
    fn add_route(&self, router: Router) -> Router {
        router.route(PROMETHEUS_METRICS_PATH, get(Self::get_metrics))
    }
}
