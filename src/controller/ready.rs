// Package api provides the readiness controller.

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::coordinator::{Coordinator, CoordinatorError};
use crate::http::Controller;

#[derive(Debug, Deserialize)]
pub struct ReadyParams {
    /// Optional humantime wait budget ("2s", "500ms"). Without it the
    /// current readiness is returned immediately.
    pub timeout: Option<String>,
}

/// ReadyController answers "is it safe to start service X now", optionally
/// blocking until the dependency chain comes up.
pub struct ReadyController {
    coordinator: Arc<Coordinator>,
}

impl ReadyController {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    async fn ready(&self, name: String, params: ReadyParams) -> Response {
        let timeout = match params.timeout.as_deref() {
            None => None,
            Some(raw) => match humantime::parse_duration(raw) {
                Ok(d) => Some(d),
                Err(e) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": format!("invalid timeout {raw:?}: {e}") })),
                    )
                        .into_response();
                }
            },
        };

        match timeout {
            None => match self.coordinator.is_ready(&name) {
                Ok(ready) => (
                    StatusCode::OK,
                    Json(json!({ "service": name, "ready": ready })),
                )
                    .into_response(),
                Err(e) => (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": e.to_string() })),
                )
                    .into_response(),
            },
            Some(timeout) => match self.coordinator.await_ready(&name, timeout).await {
                Ok(()) => (
                    StatusCode::OK,
                    Json(json!({ "service": name, "ready": true })),
                )
                    .into_response(),
                Err(e @ CoordinatorError::StartupTimeout { .. }) => (
                    StatusCode::GATEWAY_TIMEOUT,
                    Json(json!({ "service": name, "ready": false, "error": e.to_string() })),
                )
                    .into_response(),
                Err(e) => (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": e.to_string() })),
                )
                    .into_response(),
            },
        }
    }
}

impl Controller for ReadyController {
    fn add_route(&self, router: Router) -> Router {
        let ready_controller = self.clone();
        router.route(
            "/discovery/ready/:name",
            get(
                move |Path(name): Path<String>, Query(params): Query<ReadyParams>| {
                    let controller = ready_controller.clone();
                    async move { controller.ready(name, params).await }
                },
            ),
        )
    }
}

impl Clone for ReadyController {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
        }
    }
}
