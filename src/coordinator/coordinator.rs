// Package coordinator answers "what is the health/address of service X"
// and "is it safe to start service Y now".

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::warn;

use crate::config::ResolutionMode;
use crate::graph::{DependencyGraph, GraphError};
use crate::metrics::meter;
use crate::probe::HealthEvent;
use crate::registry::{EndpointRecord, HealthState, RegistryError, ServiceRegistry};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("no addressable endpoint for service {0:?}")]
    ServiceUnavailable(String),
    #[error("startup timeout: {service:?} dependencies not ready within {timeout:?}")]
    StartupTimeout { service: String, timeout: Duration },
}

/// Discovery Coordinator.
///
/// Owns no probing machinery itself: the scheduler publishes health events
/// into the broadcast channel shared here, and all endpoint state lives in
/// the registry. One instance is created at process start and passed
/// explicitly to every consumer.
pub struct Coordinator {
    registry: Arc<ServiceRegistry>,
    graph: DependencyGraph,
    events: broadcast::Sender<HealthEvent>,
    // Round-robin cursors, one per service; endpoint picks contend only on
    // their own service's counter.
    cursors: DashMap<String, AtomicUsize>,
}

impl Coordinator {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        graph: DependencyGraph,
        events: broadcast::Sender<HealthEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            graph,
            events,
            cursors: DashMap::new(),
        })
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Ordered endpoint snapshot for `name` (§4.1 passthrough).
    pub fn resolve(&self, name: &str) -> Result<Vec<Arc<EndpointRecord>>, CoordinatorError> {
        Ok(self.registry.resolve(name)?)
    }

    /// Direct vs. gateway-routed addressing for `name`.
    pub fn resolve_mode(&self, name: &str) -> Result<ResolutionMode, CoordinatorError> {
        Ok(self.registry.resolve_mode(name)?)
    }

    /// True iff every transitive dependency of `name` aggregates to
    /// Healthy or Degraded. The service's own health does not matter here;
    /// a dependency stuck at Unknown or Unhealthy blocks its dependents.
    pub fn is_ready(&self, name: &str) -> Result<bool, CoordinatorError> {
        for dep in self.graph.transitive_providers(name)? {
            if !self.registry.service_health(&dep)?.is_addressable() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Picks one endpoint for `name`: round-robin across Healthy
    /// endpoints, Degraded ones only when no Healthy exist, and
    /// `ServiceUnavailable` when nothing addressable is left.
    pub fn address(&self, name: &str) -> Result<String, CoordinatorError> {
        let records = self.registry.resolve(name)?;

        let healthy: Vec<&Arc<EndpointRecord>> = records
            .iter()
            .filter(|r| r.health() == HealthState::Healthy)
            .collect();
        let pool = if healthy.is_empty() {
            records
                .iter()
                .filter(|r| r.health() == HealthState::Degraded)
                .collect()
        } else {
            healthy
        };

        if pool.is_empty() {
            return Err(CoordinatorError::ServiceUnavailable(name.to_string()));
        }

        let cursor = self
            .cursors
            .entry(name.to_string())
            .or_insert_with(|| AtomicUsize::new(0));
        let idx = cursor.fetch_add(1, Ordering::Relaxed) % pool.len();
        Ok(pool[idx].address().to_string())
    }

    /// Health-change event stream. Callers interested in one service
    /// filter by `HealthEvent::service` instead of polling shared flags.
    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.events.subscribe()
    }

    /// Resolves when `is_ready(name)` flips true, fails with
    /// `StartupTimeout` once `timeout` elapses. The timeout cancels only
    /// this waiter; probe loops are process-wide and keep running.
    pub async fn await_ready(&self, name: &str, timeout: Duration) -> Result<(), CoordinatorError> {
        // Subscribe before the initial check so a transition between the
        // check and the first recv is not lost.
        let mut rx = self.events.subscribe();

        if self.is_ready(name)? {
            return Ok(());
        }

        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        if self.is_ready(name)? {
                            return Ok(());
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        // Probing stopped (shutdown); nothing will change
                        // anymore, let the timeout fire.
                        futures::future::pending::<()>().await;
                    }
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                meter::add_await_timeouts(1);
                warn!(
                    component = "coordinator",
                    event = "await_ready_timeout",
                    service = name,
                    timeout = %humantime::format_duration(timeout),
                    "dependency chain did not become ready in time"
                );
                Err(CoordinatorError::StartupTimeout {
                    service: name.to_string(),
                    timeout,
                })
            }
        }
    }
}
