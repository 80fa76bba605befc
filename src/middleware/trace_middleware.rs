//! Request tracing middleware.

use axum::Router;
use tower_http::trace::TraceLayer;

use super::middleware::Middleware;

/// Wraps every request in a tracing span with method/path/status fields.
pub struct TraceMiddleware;

impl TraceMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TraceMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for TraceMiddleware {
    fn apply(&self, router: Router) -> Router {
        router.layer(TraceLayer::new_for_http())
    }
}
