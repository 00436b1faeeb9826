// src/engine/readiness.rs

//! Readiness checks and skip propagation.
//!
//! Both may transition nodes (to DEPFAIL or SKIPPED) without running them,
//! notifying the observer for every such transition.

use std::collections::VecDeque;

use tracing::debug;

use crate::dag::TestGraph;
use crate::engine::observer::Observer;
use crate::node::Node;
use crate::types::{State, is_pending};

/// Whether `node` may start now.
///
/// A `false` return with the node's state now set means it was
/// short-circuited and will never run in this run.
pub fn depcheck(graph: &TestGraph, node: &Node, observer: &dyn Observer) -> bool {
    if node.is_fixture() {
        fixture_depcheck(graph, node, observer)
    } else {
        test_depcheck(graph, node, observer)
    }
}

/// Regular tests need every dependency OK or UOK. A failed dependency
/// yields DEPFAIL, a skipped one SKIPPED.
fn test_depcheck(graph: &TestGraph, node: &Node, observer: &dyn Observer) -> bool {
    let states: Vec<Option<State>> = node
        .dependencies()
        .iter()
        .map(|dep| graph.get(dep).and_then(|d| d.state()))
        .collect();

    if states.iter().flatten().any(|s| s.is_failed()) {
        short_circuit(node, State::Depfail, observer);
        return false;
    }
    if states.contains(&Some(State::Skipped)) {
        short_circuit(node, State::Skipped, observer);
        return false;
    }
    states.iter().all(|s| s.is_some_and(State::is_positive))
}

/// Fixtures only need their dependencies resolved, whatever the outcome,
/// but a failed or skipped partner short-circuits them.
fn fixture_depcheck(graph: &TestGraph, node: &Node, observer: &dyn Observer) -> bool {
    if let Some(partner) = node.partner().and_then(|key| graph.get(key)) {
        match partner.state() {
            Some(state) if state.is_failed() => {
                short_circuit(node, State::Depfail, observer);
                return false;
            }
            Some(State::Skipped) => {
                short_circuit(node, State::Skipped, observer);
                return false;
            }
            _ => {}
        }
    }

    node.dependencies()
        .iter()
        .all(|dep| !is_pending(graph.get(dep).and_then(|d| d.state())))
}

fn short_circuit(node: &Node, state: State, observer: &dyn Observer) {
    let Some(result) = node.result() else { return };
    if result.transition(state) {
        debug!(node = %node.key(), %state, "short-circuited before running");
        observer.notify(node, state);
    }
}

enum SkipRequest {
    /// Skip the node, subject to the fixture rule.
    Skip(String),
    /// Skip the node unconditionally (if it has not started).
    Force(String),
    /// A dependent of the node has been skipped.
    DependentSkipped(String),
}

/// Skip `key` and propagate: dependents are skipped, and fixtures left with
/// no live dependents are skipped too.
///
/// A fixture asked to skip only does so when all of its dependencies other
/// than its partner are skipped already; it has to run otherwise.
pub fn skip_node(graph: &TestGraph, key: &str, observer: &dyn Observer) {
    let mut work = VecDeque::from([SkipRequest::Skip(key.to_string())]);

    while let Some(request) = work.pop_front() {
        match request {
            SkipRequest::Skip(key) => {
                let Some(node) = graph.get(&key) else { continue };
                if node.is_fixture() && !fixture_may_skip(graph, node) {
                    continue;
                }
                work.push_back(SkipRequest::Force(key));
            }
            SkipRequest::Force(key) => {
                let Some(node) = graph.get(&key) else { continue };
                if node.state().is_some() {
                    continue;
                }
                let Some(result) = node.result() else { continue };
                if !result.transition(State::Skipped) {
                    continue;
                }
                debug!(node = %node.key(), "skipped");
                observer.notify(node, State::Skipped);

                work.extend(node.dependents().iter().cloned().map(SkipRequest::Skip));
                work.extend(
                    node.dependencies()
                        .iter()
                        .cloned()
                        .map(SkipRequest::DependentSkipped),
                );
            }
            SkipRequest::DependentSkipped(key) => {
                let Some(node) = graph.get(&key) else { continue };
                if !node.is_fixture() {
                    continue;
                }
                let all_skipped = node
                    .dependents()
                    .iter()
                    .all(|dep| graph.get(dep).and_then(|d| d.state()) == Some(State::Skipped));
                if all_skipped {
                    work.push_back(SkipRequest::Force(key));
                }
            }
        }
    }
}

fn fixture_may_skip(graph: &TestGraph, node: &Node) -> bool {
    node.dependencies()
        .iter()
        .filter(|dep| node.partner() != Some(dep.as_str()))
        .all(|dep| graph.get(dep).and_then(|d| d.state()) == Some(State::Skipped))
}
