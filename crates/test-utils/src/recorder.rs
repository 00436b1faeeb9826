#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dagtest::engine::Observer;
use dagtest::{Node, State, TestContext, TestError, TestOutcome};
use parking_lot::Mutex;

/// One observed transition.
#[derive(Debug, Clone)]
pub struct Event {
    pub key: String,
    pub fixture: bool,
    pub state: State,
    pub at: Instant,
}

/// Observer that records every transition in arrival order.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// States reported for `key`, in order.
    pub fn states_of(&self, key: &str) -> Vec<State> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.key == key)
            .map(|e| e.state)
            .collect()
    }

    /// Position of the first `state` event for `key`.
    pub fn position(&self, key: &str, state: State) -> Option<usize> {
        self.events
            .lock()
            .iter()
            .position(|e| e.key == key && e.state == state)
    }

    /// Position of the first terminal event for `key`.
    pub fn finished_at(&self, key: &str) -> Option<usize> {
        self.events
            .lock()
            .iter()
            .position(|e| e.key == key && e.state.is_terminal())
    }

    /// Keys that reported RUNNING, in order.
    pub fn started(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.state == State::Running)
            .map(|e| e.key.clone())
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn notify(&self, node: &Node, state: State) {
        self.events.lock().push(Event {
            key: node.key().to_string(),
            fixture: node.is_fixture(),
            state,
            at: Instant::now(),
        });
    }
}

/// Shared call counter for test bodies.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    calls: Arc<AtomicUsize>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn bump(&self) -> usize {
        self.calls.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Body that counts its calls and passes.
    pub fn passing(&self) -> impl Fn(&TestContext) -> TestOutcome + Send + Sync + 'static {
        let counter = self.clone();
        move |_| {
            counter.bump();
            Ok(())
        }
    }

    /// Body that counts its calls and fails.
    pub fn failing(&self) -> impl Fn(&TestContext) -> TestOutcome + Send + Sync + 'static {
        let counter = self.clone();
        move |_| {
            counter.bump();
            Err(TestError::failure("expected failure"))
        }
    }
}
