// Package api provides the startup report controller.

use axum::{http::StatusCode, response::IntoResponse, response::Response, routing::get, Json, Router};
use std::sync::Arc;

use crate::coordinator::StartupSequencer;
use crate::http::Controller;

/// StartupReportController exposes the sequencer's waves and per-service
/// phases to operators.
pub struct StartupReportController {
    sequencer: Arc<StartupSequencer>,
}

impl StartupReportController {
    pub fn new(sequencer: Arc<StartupSequencer>) -> Self {
        Self { sequencer }
    }

    async fn report(&self) -> Response {
        (StatusCode::OK, Json(self.sequencer.report())).into_response()
    }
}

impl Controller for StartupReportController {
    fn add_route(&self, router: Router) -> Router {
        let report_controller = self.clone();
        router.route(
            "/discovery/startup",
            get(move || {
                let controller = report_controller.clone();
                async move { controller.report().await }
            }),
        )
    }
}

impl Clone for StartupReportController {
    fn clone(&self) -> Self {
        Self {
            sequencer: self.sequencer.clone(),
        }
    }
}
