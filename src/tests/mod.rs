//! Integration tests for svcdisco.
//!
//! End-to-end scenarios over real probe loops and stub upstream services:
//! hysteresis, startup sequencing, registration events and the HTTP query
//! surface.

mod cases_registry_events_test;
mod cases_startup_sequence_test;

pub mod support;
