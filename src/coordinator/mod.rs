// Package coordinator orchestrates registry, prober and dependency graph.

pub mod coordinator;
pub mod startup;


// Re-export main types
pub use coordinator::{Coordinator, CoordinatorError};
pub use startup::{StartupPhase, StartupReport, StartupSequencer};
