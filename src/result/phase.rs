// src/result/phase.rs

//! Scoped phase accounting.

use std::sync::Arc;

use tracing::warn;

use crate::exec::policy::Verdict;
use crate::node::{TestContext, TestError, TestOutcome};
use crate::result::{RunResult, Slot};

/// Kind recorded when a phase is abandoned without an outcome.
pub const ABORTED_KIND: &str = "Aborted";

/// Handle for one execution window (a phase or a sub-invocation).
///
/// Entering clears the context's capture buffers. [`finish`](Self::finish)
/// collects the captured output and records the outcome. Dropping the guard
/// without finishing still records a message, with an `Aborted` error, so
/// no window ever goes unaccounted for.
#[must_use = "a phase guard records its message when finished or dropped"]
pub struct PhaseGuard {
    result: Arc<RunResult>,
    slot: Slot,
    context: Arc<TestContext>,
    finished: bool,
}

impl PhaseGuard {
    pub(crate) fn enter(result: Arc<RunResult>, slot: Slot, context: Arc<TestContext>) -> Self {
        let _ = context.retrieve();
        Self {
            result,
            slot,
            context,
            finished: false,
        }
    }

    pub fn context(&self) -> &Arc<TestContext> {
        &self.context
    }

    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    /// Record `outcome` and close the window.
    pub fn finish(mut self, outcome: TestOutcome) -> Verdict {
        self.finished = true;
        self.record(outcome.err())
    }

    fn record(&self, raised: Option<TestError>) -> Verdict {
        let captured = self.context.retrieve();
        match &self.slot {
            Slot::Phase(phase) => self.result.record_phase(*phase, captured, raised),
            Slot::Sub(id) => self.result.record_sub(id.clone(), captured, raised),
        }
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(node = %self.result.key(), slot = %self.slot.id(), "phase ended without an outcome");
        self.record(Some(TestError::error(
            ABORTED_KIND,
            "phase ended without an outcome",
        )));
    }
}
