// Package graph encodes startup ordering constraints between services.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::{Config, ConfigTrait};

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("adding edge {consumer:?} -> {provider:?} would create a cycle")]
    CyclicDependency { consumer: String, provider: String },
    #[error("unknown service: {0}")]
    UnknownService(String),
}

/// Directed acyclic graph of "consumer depends on provider" edges.
///
/// Nodes are fixed at construction (every configured service, dependent or
/// not, takes part in startup ordering). Edge insertion rejects cycles
/// before mutating anything.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    // consumer -> providers it depends on
    providers: HashMap<String, HashSet<String>>,
}

impl DependencyGraph {
    /// Creates a graph over a fixed node set with no edges.
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            providers: nodes
                .into_iter()
                .map(|n| (n.into(), HashSet::new()))
                .collect(),
        }
    }

    /// Builds the graph from configuration, validating acyclicity eagerly.
    pub fn from_config(cfg: &Config) -> Result<Self, GraphError> {
        let mut graph = Self::new(cfg.services().keys().cloned());
        // Deterministic insertion order keeps validation errors stable.
        let mut names: Vec<&String> = cfg.services().keys().collect();
        names.sort();
        for name in names {
            let svc = &cfg.services()[name];
            let mut deps: Vec<&String> = svc.depends_on.iter().collect();
            deps.sort();
            for dep in deps {
                graph.add_edge(name, dep)?;
            }
        }
        Ok(graph)
    }

    /// Adds a "consumer depends on provider" edge.
    ///
    /// Fails with `CyclicDependency` when the edge would close a cycle and
    /// with `UnknownService` for names outside the node set. The graph is
    /// left untouched on any failure: reachability is checked before
    /// insertion.
    pub fn add_edge(&mut self, consumer: &str, provider: &str) -> Result<(), GraphError> {
        if !self.providers.contains_key(consumer) {
            return Err(GraphError::UnknownService(consumer.to_string()));
        }
        if !self.providers.contains_key(provider) {
            return Err(GraphError::UnknownService(provider.to_string()));
        }

        // A self-edge is the smallest cycle; reaches(provider, consumer)
        // also covers it, but the explicit check gives a cheap fast path.
        if consumer == provider || self.reaches(provider, consumer) {
            return Err(GraphError::CyclicDependency {
                consumer: consumer.to_string(),
                provider: provider.to_string(),
            });
        }

        self.providers
            .get_mut(consumer)
            .expect("consumer presence checked above")
            .insert(provider.to_string());
        Ok(())
    }

    /// True when `from` transitively depends on `to`.
    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut seen: HashSet<&str> = HashSet::new();
        queue.push_back(from);
        seen.insert(from);

        while let Some(node) = queue.pop_front() {
            if node == to {
                return true;
            }
            if let Some(deps) = self.providers.get(node) {
                for dep in deps {
                    if seen.insert(dep.as_str()) {
                        queue.push_back(dep);
                    }
                }
            }
        }
        false
    }

    /// Every service `name` transitively depends on (providers of
    /// providers included, `name` itself excluded).
    pub fn transitive_providers(&self, name: &str) -> Result<HashSet<String>, GraphError> {
        if !self.providers.contains_key(name) {
            return Err(GraphError::UnknownService(name.to_string()));
        }

        let mut out: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(name);

        while let Some(node) = queue.pop_front() {
            if let Some(deps) = self.providers.get(node) {
                for dep in deps {
                    if out.insert(dep.clone()) {
                        queue.push_back(dep);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Direct providers of `name`.
    pub fn direct_providers(&self, name: &str) -> Result<Vec<String>, GraphError> {
        let deps = self
            .providers
            .get(name)
            .ok_or_else(|| GraphError::UnknownService(name.to_string()))?;
        let mut out: Vec<String> = deps.iter().cloned().collect();
        out.sort();
        Ok(out)
    }

    /// Every service that transitively depends on `name` (consumers of
    /// consumers included). Used to cascade startup failure to dependents.
    pub fn transitive_consumers(&self, name: &str) -> Result<HashSet<String>, GraphError> {
        if !self.providers.contains_key(name) {
            return Err(GraphError::UnknownService(name.to_string()));
        }

        let mut out: HashSet<String> = HashSet::new();
        let mut changed = true;
        // Small graphs; a fixpoint pass beats materializing a reverse index.
        while changed {
            changed = false;
            for (consumer, deps) in &self.providers {
                if out.contains(consumer) || consumer == name {
                    continue;
                }
                if deps.contains(name) || deps.iter().any(|d| out.contains(d)) {
                    out.insert(consumer.clone());
                    changed = true;
                }
            }
        }
        Ok(out)
    }

    /// Partitions services into ordered startup waves: wave 0 has no
    /// dependencies, wave k's dependencies are all satisfied by waves < k.
    /// Services within a wave may start concurrently.
    pub fn startup_order(&self) -> Vec<Vec<String>> {
        let mut remaining: HashMap<&str, HashSet<&str>> = self
            .providers
            .iter()
            .map(|(k, v)| (k.as_str(), v.iter().map(|s| s.as_str()).collect()))
            .collect();

        let mut waves: Vec<Vec<String>> = Vec::new();
        let mut satisfied: HashSet<&str> = HashSet::new();

        while !remaining.is_empty() {
            let mut wave: Vec<String> = remaining
                .iter()
                .filter(|(_, deps)| deps.iter().all(|d| satisfied.contains(d)))
                .map(|(name, _)| name.to_string())
                .collect();

            // The node set is acyclic by construction, so progress is
            // guaranteed; an empty wave would mean a bug in add_edge.
            debug_assert!(!wave.is_empty(), "startup_order stalled on acyclic graph");
            if wave.is_empty() {
                break;
            }

            wave.sort();
            for name in &wave {
                remaining.remove(name.as_str());
                // Borrow the key from self.providers: it outlives `wave`.
                if let Some((key, _)) = self.providers.get_key_value(name.as_str()) {
                    satisfied.insert(key.as_str());
                }
            }
            waves.push(wave);
        }

        waves
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
