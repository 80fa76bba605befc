use crate::registry::HealthState;

// Metric name constants
pub const PROBES_TOTAL: &str = "probes_total";
pub const PROBE_FAILURES: &str = "probe_failures_total";
pub const HEALTH_TRANSITIONS: &str = "health_transitions_total";
pub const REGISTRATIONS: &str = "endpoint_registrations_total";
pub const AWAIT_READY_TIMEOUTS: &str = "await_ready_timeouts_total";
pub const STARTUP_FAILURES: &str = "startup_failures_total";

pub const ENDPOINTS_HEALTHY: &str = "endpoints_healthy";
pub const ENDPOINTS_DEGRADED: &str = "endpoints_degraded";
pub const ENDPOINTS_UNHEALTHY: &str = "endpoints_unhealthy";
pub const ENDPOINTS_UNKNOWN: &str = "endpoints_unknown";

/// Adds completed probes.
pub fn add_probes(value: u64) {
    metrics::counter!(PROBES_TOTAL).increment(value);
}

/// Adds failed probes.
pub fn add_probe_failures(value: u64) {
    metrics::counter!(PROBE_FAILURES).increment(value);
}

/// Adds endpoint health-state transitions.
pub fn add_transitions(value: u64) {
    metrics::counter!(HEALTH_TRANSITIONS).increment(value);
}

/// Adds dynamic endpoint registrations.
pub fn add_registrations(value: u64) {
    metrics::counter!(REGISTRATIONS).increment(value);
}

/// Adds await_ready calls that ended in StartupTimeout.
pub fn add_await_timeouts(value: u64) {
    metrics::counter!(AWAIT_READY_TIMEOUTS).increment(value);
}

/// Adds services marked Failed by the startup sequencer.
pub fn add_startup_failures(value: u64) {
    metrics::counter!(STARTUP_FAILURES).increment(value);
}

/// Sets the per-state endpoint count gauges from one census pass.
pub fn set_endpoint_states(healthy: u64, degraded: u64, unhealthy: u64, unknown: u64) {
    metrics::gauge!(ENDPOINTS_HEALTHY).set(healthy as f64);
    metrics::gauge!(ENDPOINTS_DEGRADED).set(degraded as f64);
    metrics::gauge!(ENDPOINTS_UNHEALTHY).set(unhealthy as f64);
    metrics::gauge!(ENDPOINTS_UNKNOWN).set(unknown as f64);
}

/// Census helper: counts endpoint states for the per-state gauges.
pub fn census<I>(records: I) -> (u64, u64, u64, u64)
where
    I: IntoIterator<Item = HealthState>,
{
    let mut counts = (0u64, 0u64, 0u64, 0u64);
    for health in records {
        match health {
            HealthState::Healthy => counts.0 += 1,
            HealthState::Degraded => counts.1 += 1,
            HealthState::Unhealthy => counts.2 += 1,
            HealthState::Unknown => counts.3 += 1,
        }
    }
    counts
}
