// Package api provides the dynamic registration controller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::coordinator::Coordinator;
use crate::http::Controller;
use crate::registry::RegistryError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub address: String,
}

/// RegisterController lets new service instances announce themselves.
/// Registration only widens an already-configured descriptor's endpoint
/// list; unknown names are rejected.
pub struct RegisterController {
    coordinator: Arc<Coordinator>,
}

impl RegisterController {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    async fn register(&self, req: RegisterRequest) -> Response {
        match self
            .coordinator
            .registry()
            .register(&req.name, &req.address)
        {
            Ok(_) => {
                let endpoints = self
                    .coordinator
                    .registry()
                    .resolve(&req.name)
                    .map(|records| records.len())
                    .unwrap_or(0);
                (
                    StatusCode::OK,
                    Json(json!({
                        "service": req.name,
                        "address": req.address,
                        "endpoints": endpoints,
                    })),
                )
                    .into_response()
            }
            Err(e @ RegistryError::UnknownService(_)) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response(),
            Err(e @ RegistryError::InvalidAddress { .. }) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response(),
        }
    }
}

impl Controller for RegisterController {
    fn add_route(&self, router: Router) -> Router {
        let register_controller = self.clone();
        router.route(
            "/discovery/register",
            post(move |Json(req): Json<RegisterRequest>| {
                let controller = register_controller.clone();
                async move { controller.register(req).await }
            }),
        )
    }
}

impl Clone for RegisterController {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
        }
    }
}
