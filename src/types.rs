// src/types.rs

//! Shared vocabulary: node keys, result states and execution phases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical node identity used throughout the crate.
///
/// Keys are fully-qualified names such as `"pkg.module.Class.test_name"`.
pub type NodeKey = String;

/// State of a node's result for the current run.
///
/// `Running` is the only non-terminal state. A node whose result has no
/// state at all has not been touched in this run yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum State {
    /// The node is executing.
    Running,
    /// Completed successfully.
    Ok,
    /// Expected to fail, but completed successfully.
    Uok,
    /// Failed.
    Fail,
    /// Expected to fail and did.
    Xfail,
    /// An unexpected error was raised.
    Error,
    /// Not run because a dependency failed or errored.
    Depfail,
    /// Deliberately not run.
    Skipped,
}

impl State {
    /// All states, in reporting order.
    pub const ALL: [State; 8] = [
        State::Running,
        State::Ok,
        State::Uok,
        State::Fail,
        State::Xfail,
        State::Error,
        State::Depfail,
        State::Skipped,
    ];

    pub fn is_terminal(self) -> bool {
        !matches!(self, State::Running)
    }

    /// `Ok` or `Uok`: a dependency in this state releases regular tests.
    pub fn is_positive(self) -> bool {
        matches!(self, State::Ok | State::Uok)
    }

    /// States that cause dependents to short-circuit to `Depfail`.
    pub fn is_failed(self) -> bool {
        matches!(
            self,
            State::Fail | State::Xfail | State::Error | State::Depfail
        )
    }

    /// Whether a test in this state counts as a pass in summaries.
    pub fn counts_as_pass(self) -> bool {
        matches!(self, State::Ok | State::Uok | State::Xfail)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Running => "RUNNING",
            State::Ok => "OK",
            State::Uok => "UOK",
            State::Fail => "FAIL",
            State::Xfail => "XFAIL",
            State::Error => "ERROR",
            State::Depfail => "DEPFAIL",
            State::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        State::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("invalid state: {s}"))
    }
}

/// Returns true while a node has not resolved in the current run
/// (no state yet, or still `Running`).
pub fn is_pending(state: Option<State>) -> bool {
    matches!(state, None | Some(State::Running))
}

/// Which part of a node's execution produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    /// Pre-test fixture (function-level set up).
    Pre,
    /// The test body itself.
    Test,
    /// Post-test fixture (function-level tear down).
    Post,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pre => "PRE",
            Phase::Test => "TEST",
            Phase::Post => "POST",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
