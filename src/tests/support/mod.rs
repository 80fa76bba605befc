// Shared test support code for integration tests.

pub mod harness;
pub mod stub;

pub use harness::{probing_config, wait_until, DiscoveryStack};
pub use stub::{HealthMode, StubService};
