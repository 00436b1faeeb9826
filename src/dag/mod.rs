// src/dag/mod.rs

//! Dependency graph of tests and fixtures.
//!
//! - [`registry`] builds the graph at discovery time and validates it.
//! - [`graph`] holds the frozen graph handed to the scheduler.
//! - [`scope`] wires setup/teardown fixtures of nested scopes.
//! - [`export`] describes the graph for visualisation (structured or DOT).

pub mod export;
pub mod graph;
pub mod registry;
pub mod scope;

pub use export::{EdgeDescription, GraphDescription, NodeDescription};
pub use graph::TestGraph;
pub use registry::Registry;
pub use scope::{Scope, wire_scopes};
