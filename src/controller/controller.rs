// Controller trait for route registration.

use axum::Router;

/// One controller owns one concern of the query surface and contributes
/// its routes to the shared router.
pub trait Controller: Send + Sync {
    fn add_route(&self, router: Router) -> Router;
}
