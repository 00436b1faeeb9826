// src/result/mod.rs

//! Per-run outcome of a node.
//!
//! - [`capture`] buffers the output written during one execution window.
//! - [`phase`] provides [`PhaseGuard`], the scoped helper that records a
//!   [`Message`] for every phase no matter how the phase ended.
//!
//! A [`RunResult`] is allocated fresh every time a node is prepared for a
//! run. Its state is monotonic: `None` may move to any state, `RUNNING` may
//! move to a terminal state, and nothing else is accepted.

pub mod capture;
pub mod phase;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::exec::policy::{Counts, ResultPolicy, Verdict};
use crate::node::{Node, Raises, TestError, classify};
use crate::types::{NodeKey, Phase, State};

pub use capture::Captured;
pub use phase::PhaseGuard;

/// Where a message is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// One of the three phases of a single-result node.
    Phase(Phase),
    /// One sub-invocation of a multi-result node, by id.
    Sub(String),
}

impl Slot {
    pub fn phase(&self) -> Phase {
        match self {
            Slot::Phase(phase) => *phase,
            Slot::Sub(_) => Phase::Test,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Slot::Phase(phase) => phase.as_str(),
            Slot::Sub(id) => id,
        }
    }
}

/// Output and raised error captured for one phase or sub-invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub phase: Phase,
    pub id: String,
    pub captured: Vec<Captured>,
    pub raised: Option<TestError>,
}

/// Ordered sub-invocation messages, addressable by id.
#[derive(Debug, Default)]
struct MessageSeq {
    reserved: HashSet<String>,
    messages: Vec<Message>,
}

impl MessageSeq {
    /// Claim `natural`, or `natural#n` with the smallest free `n >= 1`.
    fn reserve(&mut self, natural: &str) -> String {
        if self.reserved.insert(natural.to_string()) {
            return natural.to_string();
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{natural}#{n}");
            if self.reserved.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[derive(Debug, Default)]
struct ResultInner {
    state: Option<State>,
    pre: Option<Verdict>,
    test: Option<Verdict>,
    messages: BTreeMap<Phase, Message>,
    subs: MessageSeq,
    counts: Counts,
}

/// Outcome of one run of one node.
#[derive(Debug)]
pub struct RunResult {
    key: NodeKey,
    expected_failure: bool,
    multi: bool,
    raises: BTreeSet<Raises>,
    policy: Arc<dyn ResultPolicy>,
    inner: Mutex<ResultInner>,
}

impl RunResult {
    pub(crate) fn new(node: &Node) -> Self {
        Self {
            key: node.key().to_string(),
            expected_failure: node.expected_failure(),
            multi: node.is_multi(),
            raises: node.raises().clone(),
            policy: Arc::clone(node.policy()),
            inner: Mutex::new(ResultInner::default()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// `None` until the node has been touched in this run.
    pub fn state(&self) -> Option<State> {
        self.inner.lock().state
    }

    /// True once the node reached OK or UOK.
    pub fn passed(&self) -> bool {
        self.state().is_some_and(State::is_positive)
    }

    /// Whether this result aggregates several sub-invocations.
    pub fn is_multi(&self) -> bool {
        self.multi
    }

    /// Phase message, if the phase produced output or raised.
    pub fn message(&self, phase: Phase) -> Option<Message> {
        self.inner.lock().messages.get(&phase).cloned()
    }

    /// Phase messages in PRE, TEST, POST order.
    pub fn messages(&self) -> Vec<Message> {
        self.inner.lock().messages.values().cloned().collect()
    }

    /// Sub-invocation messages in completion order.
    pub fn sub_messages(&self) -> Vec<Message> {
        self.inner.lock().subs.messages.clone()
    }

    pub fn sub_message(&self, id: &str) -> Option<Message> {
        self.inner
            .lock()
            .subs
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    pub fn counts(&self) -> Counts {
        self.inner.lock().counts
    }

    /// Apply a state transition. Returns false (and changes nothing) when
    /// the transition would break monotonicity.
    pub(crate) fn transition(&self, state: State) -> bool {
        let mut inner = self.inner.lock();
        let allowed = match inner.state {
            None => true,
            Some(State::Running) => state.is_terminal(),
            Some(_) => false,
        };
        if allowed {
            trace!(node = %self.key, from = ?inner.state, to = %state, "result transition");
            inner.state = Some(state);
        }
        allowed
    }

    /// Force a node whose execution machinery broke into ERROR. Terminal
    /// states are left alone.
    pub(crate) fn force_error(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            None | Some(State::Running) => {
                inner.state = Some(State::Error);
                true
            }
            Some(_) => false,
        }
    }

    /// Claim a collision-free id for a sub-invocation.
    pub(crate) fn reserve_id(&self, natural: &str) -> String {
        self.inner.lock().subs.reserve(natural)
    }

    /// Record a PRE, TEST or POST outcome. A message is kept only if the
    /// phase produced output or raised.
    pub(crate) fn record_phase(
        &self,
        phase: Phase,
        captured: Vec<Captured>,
        raised: Option<TestError>,
    ) -> Verdict {
        let (passed, is_error) = match phase {
            Phase::Test => classify(&self.raises, raised.as_ref()),
            Phase::Pre | Phase::Post => classify(&BTreeSet::new(), raised.as_ref()),
        };
        let verdict = Verdict { passed, is_error };

        let mut inner = self.inner.lock();
        match phase {
            Phase::Pre => inner.pre = Some(verdict),
            Phase::Test => inner.test = Some(verdict),
            Phase::Post => {}
        }
        if !captured.is_empty() || raised.is_some() {
            inner.messages.insert(
                phase,
                Message {
                    phase,
                    id: phase.as_str().to_string(),
                    captured,
                    raised,
                },
            );
        }
        verdict
    }

    /// Keep output written outside any phase or sub-invocation (a generator
    /// collecting its items) without touching the verdict.
    pub(crate) fn record_output(&self, phase: Phase, captured: Vec<Captured>) {
        if captured.is_empty() {
            return;
        }
        self.inner.lock().messages.insert(
            phase,
            Message {
                phase,
                id: phase.as_str().to_string(),
                captured,
                raised: None,
            },
        );
    }

    /// Record one sub-invocation: bump the counters and re-evaluate the
    /// aggregation policy. Returns the sub-invocation's own verdict.
    pub(crate) fn record_sub(
        &self,
        id: String,
        captured: Vec<Captured>,
        raised: Option<TestError>,
    ) -> Verdict {
        let (passed, is_error) = classify(&self.raises, raised.as_ref());

        let mut inner = self.inner.lock();
        inner.counts.total += 1;
        if passed {
            inner.counts.success += 1;
        } else if is_error {
            inner.counts.error += 1;
        } else {
            inner.counts.failure += 1;
        }
        let aggregate = self.policy.evaluate(inner.counts);
        inner.test = Some(aggregate);
        inner.subs.messages.push(Message {
            phase: Phase::Test,
            id,
            captured,
            raised,
        });

        Verdict { passed, is_error }
    }

    /// Terminal state implied by everything recorded so far.
    ///
    /// The node passes only if both PRE and TEST passed, and is an error if
    /// either errored. POST never changes the verdict.
    pub(crate) fn outcome(&self) -> State {
        let inner = self.inner.lock();
        let pre = inner.pre.unwrap_or(Verdict::PASS);
        let test = match inner.test {
            Some(verdict) => verdict,
            None if self.multi => self.policy.evaluate(inner.counts),
            None => Verdict::PASS,
        };

        if pre.passed && test.passed {
            if self.expected_failure { State::Uok } else { State::Ok }
        } else if pre.is_error || test.is_error {
            State::Error
        } else if self.expected_failure {
            State::Xfail
        } else {
            State::Fail
        }
    }
}
