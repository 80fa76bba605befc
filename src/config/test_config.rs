use super::{
    Api, Config, Discovery, DiscoveryBox, Gateway, Logs, Probe, ResolutionMode, Runtime, Service,
    Startup,
};
use std::collections::HashMap;
use std::time::Duration;

/// Creates a new test configuration with no services. Add topology with
/// [`test_service`] before building the registry/graph.
pub fn new_test_config() -> Config {
    Discovery {
        discovery: DiscoveryBox {
            env: super::TEST.to_string(),
            logs: Some(Logs {
                level: Some("debug".to_string()),
            }),
            runtime: Some(Runtime { num_cpus: 4 }),
            api: Some(Api {
                name: Some("svcdisco-test".to_string()),
                port: Some("8031".to_string()),
            }),
            probe: Some(Probe {
                interval: Some(Duration::from_millis(50)),
                timeout: Some(Duration::from_millis(20)),
                failure_threshold: Some(3),
            }),
            startup: Some(Startup {
                wave_timeout: Some(Duration::from_secs(2)),
            }),
            metrics: None,
            k8s: None,
            gateway: Some(Gateway {
                addr: Some("http://gateway.test:8000".to_string()),
            }),
            services: HashMap::new(),
        },
    }
}

/// Builds one service descriptor for tests.
pub fn test_service(
    mode: ResolutionMode,
    endpoints: &[&str],
    depends_on: &[&str],
) -> Service {
    Service {
        mode,
        health_path: "/health".to_string(),
        endpoints: endpoints.iter().map(|s| s.to_string()).collect(),
        depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
    }
}
