// Package metrics provides Prometheus-compatible meters.

pub mod meter;
