// Package liveness provides process liveness probing for svcdisco itself.

pub mod prober;
pub mod service;

pub use prober::Probe;
pub use service::Service;
