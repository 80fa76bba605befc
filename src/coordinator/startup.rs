// Package coordinator provides dependency-ordered startup sequencing.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::metrics::meter;

use super::coordinator::Coordinator;

/// Per-service startup phase.
///
/// `Ready` and `Failed` are terminal for a sequencing pass; health keeps
/// being tracked afterwards for ongoing monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StartupPhase {
    /// Waiting for its wave.
    Pending,
    /// Dependencies satisfied, waiting for the first successful probe.
    Starting,
    /// First Healthy/Degraded probe observed.
    Ready,
    /// No successful probe before the wave timeout, or a dependency failed.
    Failed,
}

/// Snapshot of a sequencing pass for operators.
#[derive(Debug, Clone, Serialize)]
pub struct StartupReport {
    pub waves: Vec<Vec<String>>,
    pub phases: BTreeMap<String, StartupPhase>,
}

/// Walks the dependency waves and tracks per-service startup phases.
///
/// Services inside one wave are awaited concurrently; the sequencer does
/// not advance to wave k+1 until every service of wave k reports
/// Degraded-or-better. A wave timeout marks the stragglers Failed together
/// with all their transitive consumers, and the pass continues with
/// whatever is left; the coordinator itself never crashes on a failed
/// startup.
pub struct StartupSequencer {
    coordinator: Arc<Coordinator>,
    wave_timeout: Duration,
    phases: Mutex<HashMap<String, StartupPhase>>,
}

impl StartupSequencer {
    pub fn new(coordinator: Arc<Coordinator>, wave_timeout: Duration) -> Arc<Self> {
        let phases = coordinator
            .graph()
            .startup_order()
            .into_iter()
            .flatten()
            .map(|name| (name, StartupPhase::Pending))
            .collect();

        Arc::new(Self {
            coordinator,
            wave_timeout,
            phases: Mutex::new(phases),
        })
    }

    pub fn phase(&self, name: &str) -> Option<StartupPhase> {
        self.phases.lock().get(name).copied()
    }

    pub fn report(&self) -> StartupReport {
        StartupReport {
            waves: self.coordinator.graph().startup_order(),
            phases: self
                .phases
                .lock()
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }

    /// Runs one sequencing pass and returns the final report.
    ///
    /// Re-running is the retry path: every service not already `Ready` is
    /// reset to `Pending` first, so failed services get a fresh timeout
    /// budget while ready ones are left alone.
    pub async fn run(&self) -> StartupReport {
        {
            let mut phases = self.phases.lock();
            for phase in phases.values_mut() {
                if *phase != StartupPhase::Ready {
                    *phase = StartupPhase::Pending;
                }
            }
        }

        let waves = self.coordinator.graph().startup_order();
        for (index, wave) in waves.iter().enumerate() {
            let members: Vec<String> = {
                let mut phases = self.phases.lock();
                let mut members = Vec::new();
                for name in wave.iter() {
                    if phases.get(name) == Some(&StartupPhase::Pending) {
                        phases.insert(name.clone(), StartupPhase::Starting);
                        members.push(name.clone());
                    }
                }
                members
            };

            if members.is_empty() {
                continue;
            }

            info!(
                component = "startup",
                event = "wave_started",
                wave = index,
                services = ?members,
                "startup wave started"
            );

            let outcomes = futures::future::join_all(
                members.iter().map(|name| self.await_service_up(name)),
            )
            .await;

            for (name, came_up) in members.iter().zip(outcomes) {
                if came_up {
                    self.phases
                        .lock()
                        .insert(name.clone(), StartupPhase::Ready);
                    info!(
                        component = "startup",
                        event = "service_ready",
                        wave = index,
                        service = %name,
                        "service ready"
                    );
                } else {
                    self.fail_with_dependents(name, index);
                }
            }
        }

        self.report()
    }

    /// Waits until `name`'s own aggregate health is Degraded-or-better,
    /// bounded by the wave timeout.
    async fn await_service_up(&self, name: &str) -> bool {
        let mut rx = self.coordinator.subscribe();

        let is_up = || {
            self.coordinator
                .registry()
                .service_health(name)
                .map(|h| h.is_addressable())
                .unwrap_or(false)
        };

        if is_up() {
            return true;
        }

        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        if is_up() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        futures::future::pending::<()>().await;
                    }
                }
            }
        };

        tokio::time::timeout(self.wave_timeout, wait).await.is_ok()
    }

    /// Marks a straggler Failed and cascades the failure to everything
    /// that transitively depends on it.
    fn fail_with_dependents(&self, name: &str, wave: usize) {
        let dependents = self
            .coordinator
            .graph()
            .transitive_consumers(name)
            .unwrap_or_default();

        let mut failed = 0u64;
        {
            let mut phases = self.phases.lock();
            phases.insert(name.to_string(), StartupPhase::Failed);
            failed += 1;
            for dependent in &dependents {
                if phases.get(dependent) != Some(&StartupPhase::Ready) {
                    phases.insert(dependent.clone(), StartupPhase::Failed);
                    failed += 1;
                }
            }
        }
        meter::add_startup_failures(failed);

        error!(
            component = "startup",
            event = "service_failed",
            wave = wave,
            service = %name,
            wave_timeout = %humantime::format_duration(self.wave_timeout),
            blocked_dependents = dependents.len(),
            "service did not come up within the wave timeout"
        );
    }
}
