// Package liveness provides the liveness probe aggregator.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::service::Service;

#[derive(Debug, thiserror::Error)]
#[error("liveness probe timeout is too short")]
pub struct TimeoutIsTooShortError;

const MIN_TIMEOUT: Duration = Duration::from_millis(1);
const FALLBACK_TIMEOUT: Duration = Duration::from_millis(10);

/// Aggregates liveness over the watched services; the process is alive
/// only when every watched service is.
pub struct Probe {
    timeout: Duration,
    services: RwLock<Vec<Arc<dyn Service>>>,
}

impl Probe {
    pub fn new(timeout_duration: Duration) -> Self {
        let timeout = if timeout_duration < MIN_TIMEOUT {
            warn!(
                error = %TimeoutIsTooShortError,
                "min timeout duration is 1ms (falling back to 10ms)"
            );
            FALLBACK_TIMEOUT
        } else {
            timeout_duration
        };

        Self {
            timeout,
            services: RwLock::new(Vec::new()),
        }
    }

    /// Adds services to watch. Must be called before the probe endpoint is
    /// served; an empty watch list reports not-alive.
    pub fn watch(&self, services: Vec<Arc<dyn Service>>) {
        self.services.write().extend(services);
    }

    pub fn is_alive(&self) -> bool {
        let services = self.services.read();
        !services.is_empty() && services.iter().all(|s| s.is_alive(self.timeout))
    }
}
