// src/engine/report.rs

//! End-of-run data for reporting collaborators.

use std::sync::Arc;

use serde::Serialize;

use crate::exec::resource::ResourceError;
use crate::node::Node;
use crate::result::RunResult;
use crate::types::{NodeKey, State};

/// An error that escaped the execution machinery of a node (not the node's
/// own callables). The node was forced to ERROR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameworkError {
    pub node: NodeKey,
    pub message: String,
}

/// Per-state counts over regular tests (fixtures excluded).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub ok: usize,
    pub uok: usize,
    pub fail: usize,
    pub xfail: usize,
    pub error: usize,
    pub depfail: usize,
    pub skipped: usize,
    pub total: usize,
    /// Highest number of simultaneously launched nodes.
    pub threads: usize,
}

impl Summary {
    pub(crate) fn record(&mut self, state: Option<State>) {
        self.total += 1;
        match state {
            Some(State::Ok) => self.ok += 1,
            Some(State::Uok) => self.uok += 1,
            Some(State::Fail) => self.fail += 1,
            Some(State::Xfail) => self.xfail += 1,
            Some(State::Error) => self.error += 1,
            Some(State::Depfail) => self.depfail += 1,
            Some(State::Skipped) => self.skipped += 1,
            Some(State::Running) | None => {}
        }
    }

    pub fn count(&self, state: State) -> usize {
        match state {
            State::Ok => self.ok,
            State::Uok => self.uok,
            State::Fail => self.fail,
            State::Xfail => self.xfail,
            State::Error => self.error,
            State::Depfail => self.depfail,
            State::Skipped => self.skipped,
            State::Running => 0,
        }
    }

    /// OK, UOK and XFAIL.
    pub fn passes(&self) -> usize {
        State::ALL
            .into_iter()
            .filter(|state| state.counts_as_pass())
            .map(|state| self.count(state))
            .sum()
    }

    /// FAIL, ERROR and DEPFAIL.
    pub fn failures(&self) -> usize {
        self.fail + self.error + self.depfail
    }

    pub fn passed(&self) -> bool {
        self.failures() == 0
    }
}

/// A node and the result of its latest run.
#[derive(Debug, Clone)]
pub struct NodeOutcome {
    pub node: Arc<Node>,
    pub result: Arc<RunResult>,
}

impl NodeOutcome {
    pub fn state(&self) -> Option<State> {
        self.result.state()
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Results of every node, fixtures included, in registration order.
    pub outcomes: Vec<NodeOutcome>,
    pub summary: Summary,
    pub framework_errors: Vec<FrameworkError>,
    pub resource_errors: Vec<ResourceError>,
    /// Nodes still waiting when the last running node finished.
    pub stranded: Vec<NodeKey>,
}

impl RunReport {
    /// No test failed, errored or was dependency-failed, and nothing was
    /// left stranded.
    pub fn passed(&self) -> bool {
        self.summary.passed() && self.stranded.is_empty()
    }

    pub fn outcome(&self, key: &str) -> Option<&NodeOutcome> {
        self.outcomes.iter().find(|o| o.node.key() == key)
    }

    pub fn state(&self, key: &str) -> Option<State> {
        self.outcome(key).and_then(NodeOutcome::state)
    }

    pub fn result(&self, key: &str) -> Option<&Arc<RunResult>> {
        self.outcome(key).map(|o| &o.result)
    }
}
