// src/engine/observer.rs

//! State-transition notifications.

use tracing::{debug, info, warn};

use crate::node::Node;
use crate::types::State;

/// Receives every state transition of every node, including RUNNING and
/// fixture transitions. Implementations decide what to filter.
///
/// Called from scheduler and executor tasks, sometimes while scheduler
/// bookkeeping is locked; implementations must not call back into the
/// scheduler.
pub trait Observer: Send + Sync {
    fn notify(&self, node: &Node, state: State);
}

impl<F> Observer for F
where
    F: Fn(&Node, State) + Send + Sync,
{
    fn notify(&self, node: &Node, state: State) {
        self(node, state)
    }
}

/// Default observer: logs transitions through `tracing`.
///
/// RUNNING and fixture transitions are logged at debug level, terminal test
/// transitions at info (or warn for failures).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn notify(&self, node: &Node, state: State) {
        if state == State::Running || node.is_fixture() {
            debug!(node = %node.key(), fixture = node.is_fixture(), %state, "transition");
        } else if state.is_failed() && state != State::Xfail {
            warn!(node = %node.key(), %state, "test finished");
        } else {
            info!(node = %node.key(), %state, "test finished");
        }
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn notify(&self, _node: &Node, _state: State) {}
}
