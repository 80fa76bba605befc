// Package registry provides per-endpoint health records.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Health classification of a single endpoint.
///
/// `Unknown` is the initial state before any probe completes. Transitions
/// happen only through [`EndpointRecord::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthState {
    /// An endpoint in this state may be handed out to callers.
    pub fn is_addressable(self) -> bool {
        matches!(self, HealthState::Healthy | HealthState::Degraded)
    }

    /// Ranking used when aggregating endpoint states into a service state.
    /// Higher is better; Unknown outranks Unhealthy because an unprobed
    /// endpoint has not been proven dead.
    pub(crate) fn rank(self) -> u8 {
        match self {
            HealthState::Healthy => 3,
            HealthState::Degraded => 2,
            HealthState::Unknown => 1,
            HealthState::Unhealthy => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

/// Classified result of a single completed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Reachable and explicitly healthy.
    Healthy,
    /// Reachable but a sub-check reported trouble.
    Degraded,
    /// Unreachable, timed out, malformed or explicitly unhealthy.
    Failed,
}

/// A state change produced by applying a probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous: HealthState,
    pub current: HealthState,
}

/// Point-in-time view of a record, safe to serialize into API responses.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointStatus {
    pub address: String,
    pub health: HealthState,
    pub consecutive_failures: u32,
    pub last_probe_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct ProbeState {
    health: HealthState,
    consecutive_failures: u32,
    last_probe_at: Option<DateTime<Utc>>,
    // Sequence of the last applied probe; completions with an older
    // sequence are discarded so a slow stale response can never overwrite
    // fresher state.
    last_seq: u64,
}

/// One concrete network target of a service.
///
/// The record is shared between the registry snapshot (readers) and the
/// probe scheduler (single logical writer). All mutation goes through
/// [`apply`](Self::apply), a short critical section under the record's own
/// mutex; no lock is ever held across a probe's network call.
#[derive(Debug)]
pub struct EndpointRecord {
    address: String,
    next_seq: AtomicU64,
    state: Mutex<ProbeState>,
}

impl EndpointRecord {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            next_seq: AtomicU64::new(0),
            state: Mutex::new(ProbeState {
                health: HealthState::Unknown,
                consecutive_failures: 0,
                last_probe_at: None,
                last_seq: 0,
            }),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Allocates the sequence number for a probe about to start.
    /// Sequences begin at 1; `last_seq == 0` means nothing applied yet.
    pub fn begin_probe(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn health(&self) -> HealthState {
        self.state.lock().health
    }

    pub fn status(&self) -> EndpointStatus {
        let st = self.state.lock();
        EndpointStatus {
            address: self.address.clone(),
            health: st.health,
            consecutive_failures: st.consecutive_failures,
            last_probe_at: st.last_probe_at,
        }
    }

    /// Applies a completed probe tagged with `seq`.
    ///
    /// Returns the transition when the health state changed, `None` when
    /// the state was retained or the completion was stale. `threshold` is
    /// the consecutive-failure count at which the endpoint flips to
    /// Unhealthy; a reachable outcome resets the counter (hysteresis).
    pub fn apply(&self, seq: u64, outcome: ProbeOutcome, threshold: u32) -> Option<Transition> {
        let mut st = self.state.lock();
        if seq <= st.last_seq {
            return None;
        }
        st.last_seq = seq;
        st.last_probe_at = Some(Utc::now());

        let previous = st.health;
        match outcome {
            ProbeOutcome::Healthy => {
                st.consecutive_failures = 0;
                st.health = HealthState::Healthy;
            }
            ProbeOutcome::Degraded => {
                st.consecutive_failures = 0;
                st.health = HealthState::Degraded;
            }
            ProbeOutcome::Failed => {
                st.consecutive_failures = st.consecutive_failures.saturating_add(1);
                if st.consecutive_failures >= threshold {
                    st.health = HealthState::Unhealthy;
                }
                // Below the threshold the previous state is retained so a
                // single transient failure does not flap the endpoint.
            }
        }

        if st.health != previous {
            Some(Transition {
                previous,
                current: st.health,
            })
        } else {
            None
        }
    }
}
