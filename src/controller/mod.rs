// HTTP API controllers for the discovery query surface.

pub mod address;
pub mod controller;
pub mod metrics;
pub mod probe;
pub mod ready;
pub mod register;
pub mod services;
pub mod startup;

// Re-export controller types for convenience
pub use address::AddressController;
pub use metrics::PrometheusMetricsController;
pub use probe::LivenessProbeController;
pub use ready::ReadyController;
pub use register::RegisterController;
pub use services::ServicesController;
pub use startup::StartupReportController;
