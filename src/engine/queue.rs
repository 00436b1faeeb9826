// src/engine/queue.rs

//! Concurrent graph walker.
//!
//! The [`Queue`] owns the set of waiting nodes, the live-task counter and
//! its high-water mark, all behind one mutex. Scheduling is event driven:
//! the initial waiting set is offered once, and every node that finishes
//! offers its dependents again. A node is launched as soon as its readiness
//! check passes; the optional capacity semaphore is acquired inside the
//! launched task, so `threads` counts launched (not running) nodes.
//!
//! Completion is detected when the live count drops to zero. The decrement
//! and that check happen under the same lock, and a finishing node offers
//! its dependents before it decrements, so no ready node can be missed.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, warn};

use crate::dag::TestGraph;
use crate::engine::observer::Observer;
use crate::engine::readiness::{depcheck, skip_node};
use crate::engine::report::{FrameworkError, NodeOutcome, RunReport, Summary};
use crate::engine::skip::SkipRule;
use crate::exec::resource::ResourceManager;
use crate::exec::runner::{ExecEnv, execute_node};
use crate::node::Node;
use crate::result::RunResult;
use crate::types::{NodeKey, State};

/// Options for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Maximum number of simultaneously running nodes; `None` is unlimited.
    pub max_threads: Option<usize>,
    pub skip: SkipRule,
}

#[derive(Debug, Default)]
struct Books {
    waiting: HashSet<NodeKey>,
    live: usize,
    max_live: usize,
}

struct Shared {
    graph: TestGraph,
    observer: Arc<dyn Observer>,
    resources: Arc<ResourceManager>,
    capacity: Option<Arc<Semaphore>>,
    books: Mutex<Books>,
    idle: Notify,
    framework_errors: Mutex<Vec<FrameworkError>>,
}

/// Scheduler for one run of a [`TestGraph`].
pub struct Queue {
    shared: Arc<Shared>,
}

impl Queue {
    /// Prepare every node for a new run, apply the skip rule and compute the
    /// initial waiting set.
    pub fn new(graph: &TestGraph, options: RunOptions, observer: Arc<dyn Observer>) -> Self {
        for node in graph.nodes() {
            node.prepare();
        }
        for node in graph.nodes() {
            if options.skip.should_skip(node) {
                skip_node(graph, node.key(), observer.as_ref());
            }
        }

        let waiting: HashSet<NodeKey> = graph
            .nodes()
            .iter()
            .filter(|node| node.state() != Some(State::Skipped))
            .map(|node| node.key().to_string())
            .collect();
        debug!(
            nodes = graph.len(),
            waiting = waiting.len(),
            max_threads = ?options.max_threads,
            "queue prepared"
        );

        let capacity = options
            .max_threads
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

        Self {
            shared: Arc::new(Shared {
                graph: graph.clone(),
                observer,
                resources: Arc::new(ResourceManager::new()),
                capacity,
                books: Mutex::new(Books {
                    waiting,
                    ..Books::default()
                }),
                idle: Notify::new(),
                framework_errors: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Keys of nodes not yet launched or short-circuited.
    pub fn waiting(&self) -> Vec<NodeKey> {
        let books = self.shared.books.lock();
        self.shared
            .graph
            .nodes()
            .iter()
            .map(|node| node.key().to_string())
            .filter(|key| books.waiting.contains(key))
            .collect()
    }

    /// Run every waiting node and return once nothing is running.
    pub async fn run(self) -> RunReport {
        let shared = self.shared;

        let initial = {
            let books = shared.books.lock();
            shared
                .graph
                .nodes()
                .iter()
                .map(|node| node.key().to_string())
                .filter(|key| books.waiting.contains(key))
                .collect::<Vec<_>>()
        };
        shared.spawn(initial);

        loop {
            let idle = shared.idle.notified();
            if shared.books.lock().live == 0 {
                break;
            }
            idle.await;
        }

        let manager = Arc::clone(&shared.resources);
        if let Err(err) = tokio::task::spawn_blocking(move || manager.release_all()).await {
            error!(error = %err, "releasing pooled resources failed");
        }

        shared.report()
    }
}

impl Shared {
    /// Offer `candidates` to the scheduler. Ready nodes are launched;
    /// short-circuited nodes leave the waiting set and offer their own
    /// dependents in turn. Duplicates are harmless.
    fn spawn(self: &Arc<Self>, candidates: impl IntoIterator<Item = NodeKey>) {
        let mut candidates: VecDeque<NodeKey> = candidates.into_iter().collect();

        while let Some(key) = candidates.pop_front() {
            let mut books = self.books.lock();
            if !books.waiting.contains(&key) {
                continue;
            }
            let Some(node) = self.graph.get(&key) else {
                books.waiting.remove(&key);
                continue;
            };

            if depcheck(&self.graph, node, self.observer.as_ref()) {
                books.waiting.remove(&key);
                books.live += 1;
                books.max_live = books.max_live.max(books.live);
                drop(books);
                self.launch(Arc::clone(node));
            } else if node.state().is_some() {
                books.waiting.remove(&key);
                candidates.extend(node.dependents().iter().cloned());
            }
        }
    }

    fn launch(self: &Arc<Self>, node: Arc<Node>) {
        debug!(node = %node.key(), "launching");
        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.run_node(node).await });
    }

    async fn run_node(self: Arc<Self>, node: Arc<Node>) {
        // The semaphore is never closed.
        let permit = match &self.capacity {
            Some(sem) => Arc::clone(sem).acquire_owned().await.ok(),
            None => None,
        };

        let result = node.result().unwrap_or_else(|| node.prepare());
        let env = ExecEnv {
            resources: Arc::clone(&self.resources),
            observer: Arc::clone(&self.observer),
        };

        match tokio::spawn(execute_node(Arc::clone(&node), Arc::clone(&result), env)).await {
            Ok(Ok(state)) => debug!(node = %node.key(), %state, "node resolved"),
            Ok(Err(err)) => self.framework_error(&node, &result, format!("{err:#}")),
            Err(err) => self.framework_error(&node, &result, err.to_string()),
        }

        self.spawn(node.dependents().iter().cloned());
        drop(permit);

        let mut books = self.books.lock();
        books.live -= 1;
        if books.live == 0 {
            self.idle.notify_one();
        }
    }

    fn framework_error(&self, node: &Node, result: &RunResult, message: String) {
        error!(node = %node.key(), error = %message, "framework error while running node");
        self.framework_errors.lock().push(FrameworkError {
            node: node.key().to_string(),
            message,
        });
        if result.force_error() {
            self.observer.notify(node, State::Error);
        }
    }

    fn report(&self) -> RunReport {
        let (stranded, threads) = {
            let books = self.books.lock();
            let stranded: Vec<NodeKey> = self
                .graph
                .nodes()
                .iter()
                .map(|node| node.key().to_string())
                .filter(|key| books.waiting.contains(key))
                .collect();
            (stranded, books.max_live)
        };
        if !stranded.is_empty() {
            warn!(?stranded, "nodes were never ready to run");
        }

        let mut summary = Summary {
            threads,
            ..Summary::default()
        };
        let mut outcomes = Vec::with_capacity(self.graph.len());
        for node in self.graph.nodes() {
            let result = node.result().unwrap_or_else(|| node.prepare());
            if node.is_test() {
                summary.record(result.state());
            }
            outcomes.push(NodeOutcome {
                node: Arc::clone(node),
                result,
            });
        }

        info!(
            total = summary.total,
            passes = summary.passes(),
            failures = summary.failures(),
            skipped = summary.skipped,
            threads = summary.threads,
            "run finished"
        );

        RunReport {
            outcomes,
            summary,
            framework_errors: std::mem::take(&mut *self.framework_errors.lock()),
            resource_errors: self.resources.messages(),
            stranded,
        }
    }
}
