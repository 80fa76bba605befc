// Liveness target interface.

use std::time::Duration;

/// Anything the process liveness probe watches (the app itself, the API
/// server). The check must return within `timeout`.
pub trait Service: Send + Sync {
    fn is_alive(&self, timeout: Duration) -> bool;
}
