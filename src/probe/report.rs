// Package probe defines the health report wire shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::registry::ProbeOutcome;

pub const STATUS_HEALTHY: &str = "healthy";
pub const STATUS_DEGRADED: &str = "degraded";
pub const STATUS_UNHEALTHY: &str = "unhealthy";

/// Body shape expected from a service's health surface:
/// `{"status": "healthy"|"degraded"|"unhealthy", "checks": {<subsystem>: <status>}}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthReport {
    pub status: Option<String>,
    #[serde(default)]
    pub checks: BTreeMap<String, String>,
}

impl HealthReport {
    /// Derives an outcome from the per-subsystem checks when no top-level
    /// status is present: reachable with all checks passing is Healthy,
    /// reachable with any sub-check off is Degraded.
    fn derive_from_checks(&self) -> ProbeOutcome {
        if self.checks.is_empty() {
            return ProbeOutcome::Failed;
        }
        if self.checks.values().all(|s| s == STATUS_HEALTHY) {
            ProbeOutcome::Healthy
        } else {
            ProbeOutcome::Degraded
        }
    }
}

/// Classifies the body of a 2xx health response.
///
/// An unparsable body, an unrecognized status and an explicit "unhealthy"
/// all count as a failed probe: the failure counter decides whether the
/// endpoint actually turns Unhealthy.
pub fn classify_body(body: &[u8]) -> ProbeOutcome {
    let report: HealthReport = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(_) => return ProbeOutcome::Failed,
    };

    match report.status.as_deref() {
        Some(STATUS_HEALTHY) => ProbeOutcome::Healthy,
        Some(STATUS_DEGRADED) => ProbeOutcome::Degraded,
        Some(STATUS_UNHEALTHY) => ProbeOutcome::Failed,
        Some(_) => ProbeOutcome::Failed,
        None => report.derive_from_checks(),
    }
}
