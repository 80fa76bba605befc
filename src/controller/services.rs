// Package api provides the services listing controller.

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::config::ResolutionMode;
use crate::coordinator::Coordinator;
use crate::http::Controller;
use crate::registry::{EndpointStatus, HealthState, ServiceEntry};

/// One service as exposed to external callers: the health-filtered view a
/// gateway config reloader consumes to (re)program upstream targets.
#[derive(Debug, Serialize)]
pub struct ServiceView {
    pub name: String,
    pub mode: ResolutionMode,
    pub health: HealthState,
    pub ready: bool,
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    pub endpoints: Vec<EndpointStatus>,
}

/// ServicesController exposes the registry contents with aggregate health.
pub struct ServicesController {
    coordinator: Arc<Coordinator>,
    gateway: Option<String>,
}

impl ServicesController {
    pub fn new(coordinator: Arc<Coordinator>, gateway: Option<String>) -> Self {
        Self {
            coordinator,
            gateway,
        }
    }

    fn view(&self, entry: &ServiceEntry) -> ServiceView {
        let gateway = match entry.mode() {
            ResolutionMode::Gateway => self.gateway.clone(),
            ResolutionMode::Direct => None,
        };
        ServiceView {
            name: entry.name().to_string(),
            mode: entry.mode(),
            health: entry.aggregate_health(),
            ready: self.coordinator.is_ready(entry.name()).unwrap_or(false),
            depends_on: entry.depends_on().to_vec(),
            gateway,
            endpoints: entry.endpoints().iter().map(|r| r.status()).collect(),
        }
    }

    async fn list(&self) -> Response {
        let views: Vec<ServiceView> = self
            .coordinator
            .registry()
            .services()
            .iter()
            .map(|entry| self.view(entry))
            .collect();
        (StatusCode::OK, Json(views)).into_response()
    }

    async fn detail(&self, name: String) -> Response {
        match self.coordinator.registry().entry(&name) {
            Ok(entry) => (StatusCode::OK, Json(self.view(&entry))).into_response(),
            Err(e) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response(),
        }
    }
}

impl Controller for ServicesController {
    fn add_route(&self, router: Router) -> Router {
        let list_controller = self.clone();
        let detail_controller = self.clone();
        router
            .route(
                "/discovery/services",
                get(move || {
                    let controller = list_controller.clone();
                    async move { controller.list().await }
                }),
            )
            .route(
                "/discovery/services/:name",
                get(move |Path(name): Path<String>| {
                    let controller = detail_controller.clone();
                    async move { controller.detail(name).await }
                }),
            )
    }
}

impl Clone for ServicesController {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            gateway: self.gateway.clone(),
        }
    }
}
