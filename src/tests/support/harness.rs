// Integration test harness: builds the discovery stack around stub services.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::{self, Config, ConfigTrait};
use crate::coordinator::{Coordinator, StartupSequencer};
use crate::graph::DependencyGraph;
use crate::http::client::create_client;
use crate::probe::{HttpProber, ProbeScheduler, Prober};
use crate::registry::ServiceRegistry;

/// Test config with probe timings tight enough for fast suites:
/// 40ms interval, 15ms timeout, threshold 3, 1s wave timeout.
pub fn probing_config() -> Config {
    let mut cfg = config::new_test_config();
    cfg.discovery.probe = Some(config::Probe {
        interval: Some(Duration::from_millis(40)),
        timeout: Some(Duration::from_millis(15)),
        failure_threshold: Some(3),
    });
    cfg.discovery.startup = Some(config::Startup {
        wave_timeout: Some(Duration::from_secs(1)),
    });
    cfg
}

/// The full discovery core wired together, probing not yet started.
pub struct DiscoveryStack {
    pub registry: Arc<ServiceRegistry>,
    pub coordinator: Arc<Coordinator>,
    pub scheduler: Arc<ProbeScheduler>,
    pub sequencer: Arc<StartupSequencer>,
    pub shutdown: CancellationToken,
}

impl DiscoveryStack {
    pub fn build(cfg: &Config) -> Self {
        cfg.validate().expect("test config must validate");

        let shutdown = CancellationToken::new();
        let registry = Arc::new(ServiceRegistry::from_config(cfg));
        let graph = DependencyGraph::from_config(cfg).expect("acyclic test topology");
        let (events, _) = broadcast::channel(256);

        let coordinator = Coordinator::new(registry.clone(), graph, events.clone());
        let prober =
            Arc::new(HttpProber::new(create_client(), cfg.probe_timeout())) as Arc<dyn Prober>;
        let scheduler = ProbeScheduler::new(
            shutdown.clone(),
            registry.clone(),
            prober,
            cfg.probe_interval(),
            cfg.failure_threshold(),
            events,
        );
        let sequencer = StartupSequencer::new(coordinator.clone(), cfg.wave_timeout());

        Self {
            registry,
            coordinator,
            scheduler,
            sequencer,
            shutdown,
        }
    }

    pub fn start_probing(&self) {
        self.scheduler.start();
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

/// Polls `check` every 10ms until it returns true or `deadline` elapses.
pub async fn wait_until<F, Fut>(deadline: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let started = tokio::time::Instant::now();
    loop {
        if check().await {
            return true;
        }
        if started.elapsed() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
