// Configuration loading and validation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";
#[allow(dead_code)]
pub const DEBUG: &str = "debug";
#[allow(dead_code)]
pub const TEST: &str = "test";

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_WAVE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HEALTH_PATH: &str = "/health";

/// How callers should address a service's endpoints.
///
/// Resolved once at configuration load; there is no runtime
/// environment-variable branching at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    /// Address the endpoint directly (development topology).
    Direct,
    /// Address it through the configured gateway (production topology).
    Gateway,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Discovery {
    #[serde(rename = "discovery")]
    pub discovery: DiscoveryBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub runtime: Option<Runtime>,
    pub api: Option<Api>,
    pub probe: Option<Probe>,
    pub startup: Option<Startup>,
    pub metrics: Option<Metrics>,
    pub k8s: Option<K8S>,
    pub gateway: Option<Gateway>,
    #[serde(default)]
    pub services: HashMap<String, Service>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Runtime {
    pub num_cpus: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Api {
    pub name: Option<String>,
    pub port: Option<String>,
}

/// Endpoint health probing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Probe {
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(rename = "failure_threshold")]
    pub failure_threshold: Option<u32>,
}

/// Startup sequencing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Startup {
    #[serde(rename = "wave_timeout", default, with = "humantime_serde")]
    pub wave_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Metrics {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LivenessProbe {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct K8S {
    pub probe: LivenessProbe,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Gateway {
    pub addr: Option<String>,
}

/// One service descriptor as written in configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Service {
    #[serde(default = "default_mode")]
    pub mode: ResolutionMode,
    #[serde(rename = "health_path", default = "default_health_path")]
    pub health_path: String,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(rename = "depends_on", default)]
    pub depends_on: Vec<String>,
}

fn default_mode() -> ResolutionMode {
    ResolutionMode::Direct
}

fn default_health_path() -> String {
    DEFAULT_HEALTH_PATH.to_string()
}

// Config trait
pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    fn runtime(&self) -> Runtime;
    fn api(&self) -> Option<&Api>;
    fn k8s(&self) -> Option<&K8S>;
    fn metrics_enabled(&self) -> bool;
    fn gateway_addr(&self) -> Option<&str>;
    fn services(&self) -> &HashMap<String, Service>;
    fn service(&self, name: &str) -> Option<&Service>;
    fn probe_interval(&self) -> Duration;
    fn probe_timeout(&self) -> Duration;
    fn failure_threshold(&self) -> u32;
    fn wave_timeout(&self) -> Duration;
}

// Config type alias for convenience
pub type Config = Discovery;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.discovery.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.discovery.env == PROD
    }

    fn is_test(&self) -> bool {
        self.discovery.env == TEST
    }

    fn runtime(&self) -> Runtime {
        self.discovery
            .runtime
            .clone()
            .unwrap_or(Runtime { num_cpus: 0 })
    }

    fn api(&self) -> Option<&Api> {
        self.discovery.api.as_ref()
    }

    fn k8s(&self) -> Option<&K8S> {
        self.discovery.k8s.as_ref()
    }

    fn metrics_enabled(&self) -> bool {
        self.discovery.metrics.as_ref().map_or(false, |m| m.enabled)
    }

    fn gateway_addr(&self) -> Option<&str> {
        self.discovery
            .gateway
            .as_ref()
            .and_then(|g| g.addr.as_deref())
    }

    fn services(&self) -> &HashMap<String, Service> {
        &self.discovery.services
    }

    fn service(&self, name: &str) -> Option<&Service> {
        self.discovery.services.get(name)
    }

    fn probe_interval(&self) -> Duration {
        self.discovery
            .probe
            .as_ref()
            .and_then(|p| p.interval)
            .unwrap_or(DEFAULT_PROBE_INTERVAL)
    }

    fn probe_timeout(&self) -> Duration {
        self.discovery
            .probe
            .as_ref()
            .and_then(|p| p.timeout)
            .unwrap_or(DEFAULT_PROBE_TIMEOUT)
    }

    fn failure_threshold(&self) -> u32 {
        self.discovery
            .probe
            .as_ref()
            .and_then(|p| p.failure_threshold)
            .unwrap_or(DEFAULT_FAILURE_THRESHOLD)
    }

    fn wave_timeout(&self) -> Duration {
        self.discovery
            .startup
            .as_ref()
            .and_then(|s| s.wave_timeout)
            .unwrap_or(DEFAULT_WAVE_TIMEOUT)
    }
}

impl Config {
    /// Loads configuration from a YAML file and validates it eagerly.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        let cfg: Discovery = serde_yaml::from_str(&data)
            .with_context(|| format!("unmarshal yaml from {:?}", abs_path))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validates the full configuration. Any failure here is fatal: the
    /// coordinator must not enter a running state on a broken topology.
    pub fn validate(&self) -> Result<()> {
        if self.probe_timeout() >= self.probe_interval() {
            anyhow::bail!(
                "probe timeout ({}) must be strictly less than probe interval ({})",
                humantime::format_duration(self.probe_timeout()),
                humantime::format_duration(self.probe_interval()),
            );
        }

        if self.failure_threshold() == 0 {
            anyhow::bail!("probe failure_threshold must be at least 1");
        }

        for (name, svc) in self.services() {
            for addr in &svc.endpoints {
                let parsed = url::Url::parse(addr)
                    .with_context(|| format!("service {:?}: invalid endpoint {:?}", name, addr))?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    anyhow::bail!(
                        "service {:?}: endpoint {:?} must be http or https",
                        name,
                        addr
                    );
                }
            }

            if !svc.health_path.starts_with('/') {
                anyhow::bail!(
                    "service {:?}: health_path {:?} must start with '/'",
                    name,
                    svc.health_path
                );
            }

            // Dangling dependency references fail eagerly, before any
            // probing starts.
            for dep in &svc.depends_on {
                if !self.discovery.services.contains_key(dep) {
                    anyhow::bail!("service {:?} depends on unknown service {:?}", name, dep);
                }
            }

            if svc.mode == ResolutionMode::Gateway && self.gateway_addr().is_none() {
                anyhow::bail!(
                    "service {:?} is gateway-routed but no gateway.addr is configured",
                    name
                );
            }
        }

        // Cycle detection is part of load-time validation: a cyclic
        // dependency set is a configuration error, not a runtime fault.
        crate::graph::DependencyGraph::from_config(self)
            .context("dependency graph validation failed")?;

        Ok(())
    }
}

// Test config is always available for integration tests
mod test_config;
#[allow(dead_code)]
pub use test_config::{new_test_config, test_service};
