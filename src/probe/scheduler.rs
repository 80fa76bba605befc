// Package probe provides the per-endpoint probe scheduler.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::metrics::meter;
use crate::registry::{
    EndpointRecord, HealthState, ProbeOutcome, RegistryEvent, ServiceRegistry, Transition,
};

use super::prober::Prober;

/// Health-state change of one endpoint, published to subscribers
/// (readiness waiters, gateway config reloaders, UI hooks).
#[derive(Debug, Clone)]
pub struct HealthEvent {
    pub service: String,
    pub address: String,
    pub previous: HealthState,
    pub current: HealthState,
}

/// Drives periodic probes: one independently scheduled task per endpoint,
/// so a slow or hanging probe on one endpoint never delays the others.
///
/// Each probe allocates a sequence number before the network call and
/// applies its outcome afterwards; the record discards stale completions.
/// No lock is held across the network I/O.
pub struct ProbeScheduler {
    shutdown_token: CancellationToken,
    registry: Arc<ServiceRegistry>,
    prober: Arc<dyn Prober>,
    interval: Duration,
    failure_threshold: u32,
    events: broadcast::Sender<HealthEvent>,
    // (service, address) pairs that already own a probe loop; guards the
    // startup-snapshot vs. registration-event race.
    running: Mutex<HashSet<(String, String)>>,
}

impl ProbeScheduler {
    pub fn new(
        shutdown_token: CancellationToken,
        registry: Arc<ServiceRegistry>,
        prober: Arc<dyn Prober>,
        interval: Duration,
        failure_threshold: u32,
        events: broadcast::Sender<HealthEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            shutdown_token,
            registry,
            prober,
            interval,
            failure_threshold,
            events,
            running: Mutex::new(HashSet::new()),
        })
    }

    /// Starts probe loops for every registered endpoint and watches
    /// registration events so new endpoints are probed immediately.
    pub fn start(self: &Arc<Self>) {
        // Subscribe before walking the snapshot: an endpoint registered in
        // between shows up either in the snapshot or as an event, and the
        // running-set keeps it from getting two loops.
        let mut event_rx = self.registry.subscribe_events();

        for entry in self.registry.services() {
            for record in entry.endpoints() {
                self.spawn_probe_loop(entry.name().to_string(), record.clone(), false);
            }
        }

        let scheduler = self.clone();
        tokio::task::spawn(async move {
            loop {
                tokio::select! {
                    _ = scheduler.shutdown_token.cancelled() => {
                        return;
                    }
                    event = event_rx.recv() => {
                        match event {
                            Ok(RegistryEvent::EndpointAdded { service, record }) => {
                                scheduler.spawn_probe_loop(service, record, true);
                            }
                            Err(broadcast::error::RecvError::Lagged(missed)) => {
                                warn!(
                                    component = "probe-scheduler",
                                    event = "events_lagged",
                                    missed = missed,
                                    "registration events dropped, rescanning registry"
                                );
                                for entry in scheduler.registry.services() {
                                    for record in entry.endpoints() {
                                        scheduler.spawn_probe_loop(
                                            entry.name().to_string(),
                                            record.clone(),
                                            true,
                                        );
                                    }
                                }
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                return;
                            }
                        }
                    }
                }
            }
        });

        info!(
            component = "probe-scheduler",
            event = "started",
            interval = %humantime::format_duration(self.interval),
            failure_threshold = self.failure_threshold,
            "probe scheduler started"
        );
    }

    /// Spawns the probe loop for one endpoint unless one is already
    /// running. `immediate` skips the initial jitter (registration path).
    fn spawn_probe_loop(self: &Arc<Self>, service: String, record: Arc<EndpointRecord>, immediate: bool) {
        {
            let key = (service.clone(), record.address().to_string());
            let mut running = self.running.lock();
            if !running.insert(key) {
                return;
            }
        }

        let scheduler = self.clone();
        tokio::task::spawn(async move {
            scheduler.probe_loop(service, record, immediate).await;
        });
    }

    async fn probe_loop(&self, service: String, record: Arc<EndpointRecord>, immediate: bool) {
        let health_path = match self.registry.entry(&service) {
            Ok(entry) => entry.health_path().to_string(),
            Err(e) => {
                error!(
                    component = "probe-scheduler",
                    event = "probe_loop_orphaned",
                    service = %service,
                    error = %e,
                    "service vanished before probe loop start"
                );
                return;
            }
        };

        let first_tick = if immediate {
            self.probe_once(&service, &health_path, &record).await;
            Instant::now() + self.interval
        } else {
            // Spread loops across the interval so a large endpoint set does
            // not probe in one burst.
            let interval_ms = self.interval.as_millis().max(1) as u64;
            let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..interval_ms));
            Instant::now() + jitter
        };

        let mut ticker = interval_at(first_tick, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    return;
                }
                _ = ticker.tick() => {
                    self.probe_once(&service, &health_path, &record).await;
                }
            }
        }
    }

    async fn probe_once(&self, service: &str, health_path: &str, record: &Arc<EndpointRecord>) {
        let seq = record.begin_probe();
        let outcome = self.prober.probe(record.address(), health_path).await;

        meter::add_probes(1);
        if outcome == ProbeOutcome::Failed {
            meter::add_probe_failures(1);
        }

        if let Some(transition) = record.apply(seq, outcome, self.failure_threshold) {
            self.on_transition(service, record.address(), transition);
        }
    }

    fn on_transition(&self, service: &str, address: &str, transition: Transition) {
        meter::add_transitions(1);
        self.update_state_gauges();

        if transition.current == HealthState::Unhealthy {
            error!(
                component = "probe-scheduler",
                event = "health_transition",
                service = service,
                address = address,
                from = transition.previous.as_str(),
                to = transition.current.as_str(),
                "endpoint went unhealthy"
            );
        } else {
            info!(
                component = "probe-scheduler",
                event = "health_transition",
                service = service,
                address = address,
                from = transition.previous.as_str(),
                to = transition.current.as_str(),
                "endpoint health changed"
            );
        }

        // Subscribers may come and go; a send with no receivers is fine.
        let _ = self.events.send(HealthEvent {
            service: service.to_string(),
            address: address.to_string(),
            previous: transition.previous,
            current: transition.current,
        });
    }

    fn update_state_gauges(&self) {
        let states = self
            .registry
            .services()
            .into_iter()
            .flat_map(|entry| {
                entry
                    .endpoints()
                    .iter()
                    .map(|r| r.health())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let (healthy, degraded, unhealthy, unknown) = meter::census(states);
        meter::set_endpoint_states(healthy, degraded, unhealthy, unknown);
    }
}
