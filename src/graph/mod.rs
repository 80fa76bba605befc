// Package graph provides the service dependency DAG.

pub mod graph;


// Re-export main types
pub use graph::{DependencyGraph, GraphError};
