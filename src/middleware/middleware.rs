// Middleware interface for the discovery API router.

use axum::Router;

/// Middleware wraps the router with a cross-cutting layer (tracing,
/// timeouts). Applied in reverse registration order by the server.
pub trait Middleware: Send + Sync {
    fn apply(&self, router: Router) -> Router;
}
