// Package registry provides the service name -> endpoints mapping.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::{Config, ConfigTrait, ResolutionMode};
use crate::metrics::meter;

use super::record::{EndpointRecord, HealthState};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown service: {0}")]
    UnknownService(String),
    #[error("invalid endpoint address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// Registration event, observable by the probe scheduler so freshly added
/// endpoints are probed immediately instead of waiting for the next cycle.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    EndpointAdded {
        service: String,
        record: Arc<EndpointRecord>,
    },
}

/// A service descriptor together with its live endpoint records.
///
/// Immutable after construction; growing the endpoint list replaces the
/// entry inside a fresh registry snapshot.
#[derive(Debug)]
pub struct ServiceEntry {
    name: String,
    mode: ResolutionMode,
    health_path: String,
    depends_on: Vec<String>,
    endpoints: Vec<Arc<EndpointRecord>>,
}

impl ServiceEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ResolutionMode {
        self.mode
    }

    pub fn health_path(&self) -> &str {
        &self.health_path
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn endpoints(&self) -> &[Arc<EndpointRecord>] {
        &self.endpoints
    }

    /// Aggregate health across endpoints: the best endpoint state wins,
    /// Unknown when the service has no endpoints at all.
    pub fn aggregate_health(&self) -> HealthState {
        self.endpoints
            .iter()
            .map(|r| r.health())
            .max_by_key(|h| h.rank())
            .unwrap_or(HealthState::Unknown)
    }

    fn with_endpoint(&self, record: Arc<EndpointRecord>) -> Self {
        let mut endpoints = self.endpoints.clone();
        endpoints.push(record);
        Self {
            name: self.name.clone(),
            mode: self.mode,
            health_path: self.health_path.clone(),
            depends_on: self.depends_on.clone(),
            endpoints,
        }
    }
}

type Snapshot = HashMap<String, Arc<ServiceEntry>>;

/// In-memory registry with copy-on-write snapshot reads.
///
/// The endpoint map is read far more often than written: readers load the
/// current snapshot atomically and never contend with writers; `register`
/// clones the map, swaps it in under a writer mutex and publishes an event.
pub struct ServiceRegistry {
    snapshot: ArcSwap<Snapshot>,
    write_lock: Mutex<()>,
    events: broadcast::Sender<RegistryEvent>,
}

impl ServiceRegistry {
    /// Builds the registry from validated configuration. Descriptors are
    /// created here and only their endpoint lists may grow afterwards.
    pub fn from_config(cfg: &Config) -> Self {
        let mut map: Snapshot = HashMap::new();
        for (name, svc) in cfg.services() {
            let endpoints = svc
                .endpoints
                .iter()
                .map(|addr| Arc::new(EndpointRecord::new(addr.clone())))
                .collect();
            map.insert(
                name.clone(),
                Arc::new(ServiceEntry {
                    name: name.clone(),
                    mode: svc.mode,
                    health_path: svc.health_path.clone(),
                    depends_on: svc.depends_on.clone(),
                    endpoints,
                }),
            );
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            snapshot: ArcSwap::from_pointee(map),
            write_lock: Mutex::new(()),
            events,
        }
    }

    /// Adds an endpoint under `name`. Idempotent for an address that is
    /// already registered. Fails for names absent from configuration:
    /// descriptors are load-time only.
    pub fn register(
        &self,
        name: &str,
        address: &str,
    ) -> Result<Arc<EndpointRecord>, RegistryError> {
        let parsed = url::Url::parse(address).map_err(|e| RegistryError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(RegistryError::InvalidAddress {
                address: address.to_string(),
                reason: "scheme must be http or https".to_string(),
            });
        }

        let _guard = self.write_lock.lock();

        let current = self.snapshot.load_full();
        let entry = current
            .get(name)
            .ok_or_else(|| RegistryError::UnknownService(name.to_string()))?;

        if let Some(existing) = entry.endpoints.iter().find(|r| r.address() == address) {
            return Ok(existing.clone());
        }

        let record = Arc::new(EndpointRecord::new(address));
        let updated = Arc::new(entry.with_endpoint(record.clone()));

        let mut next: Snapshot = (*current).clone();
        next.insert(name.to_string(), updated);
        self.snapshot.store(Arc::new(next));

        meter::add_registrations(1);
        info!(
            component = "registry",
            event = "endpoint_registered",
            service = name,
            address = address,
            "endpoint registered"
        );

        // Nobody listening is fine; the scheduler subscribes at startup.
        let _ = self.events.send(RegistryEvent::EndpointAdded {
            service: name.to_string(),
            record: record.clone(),
        });

        Ok(record)
    }

    /// Returns the ordered endpoint records for `name`.
    pub fn resolve(&self, name: &str) -> Result<Vec<Arc<EndpointRecord>>, RegistryError> {
        Ok(self.entry(name)?.endpoints().to_vec())
    }

    /// Returns whether callers should address `name` directly or through
    /// the gateway.
    pub fn resolve_mode(&self, name: &str) -> Result<ResolutionMode, RegistryError> {
        Ok(self.entry(name)?.mode())
    }

    /// Aggregate health of a service (best endpoint state).
    pub fn service_health(&self, name: &str) -> Result<HealthState, RegistryError> {
        Ok(self.entry(name)?.aggregate_health())
    }

    pub fn entry(&self, name: &str) -> Result<Arc<ServiceEntry>, RegistryError> {
        self.snapshot
            .load()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownService(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot.load().contains_key(name)
    }

    /// All entries, ordered by name for stable API output.
    pub fn services(&self) -> Vec<Arc<ServiceEntry>> {
        let snapshot = self.snapshot.load();
        let mut entries: Vec<_> = snapshot.values().cloned().collect();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        entries
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }
}
