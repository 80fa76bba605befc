// Package api provides the endpoint selection controller.

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
use crate::coordinator::{Coordinator, CoordinatorError};
use crate::http::Controller;

#[derive(Debug, Serialize)]
struct AddressView {
    service: String,
    mode: ResolutionMode,
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway: Option<String>,
}

/// AddressController hands out one health-filtered endpoint per call,
/// round-robin across healthy instances.
pub struct AddressController {
    coordinator: Arc<Coordinator>,
    gateway: Option<String>,
}

impl AddressController {
    pub fn new(coordinator: Arc<Coordinator>, gateway: Option<String>) -> Self {
        Self {
            coordinator,
            gateway,
        }
    }

    async fn address(&self, name: String) -> Response {
        let mode = match self.coordinator.resolve_mode(&name) {
            Ok(mode) => mode,
            Err(e) => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": e.to_string() })),
                )
                    .into_response();
            }
        };

        match self.coordinator.address(&name) {
            Ok(address) => {
                let gateway = match mode {
                    ResolutionMode::Gateway => self.gateway.clone(),
                    ResolutionMode::Direct => None,
                };
                (
                    StatusCode::OK,
                    Json(AddressView {
                        service: name,
                        mode,
                        address,
                        gateway,
                    }),
                )
                    .into_response()
            }
            Err(e @ CoordinatorError::ServiceUnavailable(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string(), "retry": true })),
            )
                .into_response(),
            Err(e) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response(),
        }
    }
}

impl Controller for AddressController {
    fn add_route(&self, router: Router) -> Router {
        let address_controller = self.clone();
        router.route(
            "/discovery/address/:name",
            get(move |Path(name): Path<String>| {
                let controller = address_controller.clone();
                async move { controller.address(name).await }
            }),
        )
    }
}

impl Clone for AddressController {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            gateway: self.gateway.clone(),
        }
    }
}
