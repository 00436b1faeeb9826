// src/node/mod.rs

//! Scheduled units: tests and fixtures.
//!
//! - [`attrs`] holds the typed attribute bag.
//! - [`body`] defines the callables a node wraps and their [`TestContext`].
//! - [`builder`] provides [`NodeBuilder`], the only way to declare a node.
//!
//! A [`Node`] is created once at discovery time and persists across runs.
//! Its identity, edges and declared modifiers are fixed once the owning
//! [`Registry`](crate::dag::Registry) is frozen; only the per-run
//! [`RunResult`] is replaced at the start of every run.

pub mod attrs;
pub mod body;
pub mod builder;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::exec::policy::ResultPolicy;
use crate::exec::resource::Resource;
use crate::exec::strategy::Strategy;
use crate::result::RunResult;
use crate::types::{NodeKey, State};

pub use attrs::{AttrValue, Attrs};
pub use body::{Body, SubTest, TestContext, TestError, TestFn, TestOutcome};
pub use builder::{NodeBuilder, NodeDefaults};

/// Build a fully-qualified node key from its parts.
///
/// `qualified_name("pkg.mod", Some("Case"), "test_x")` is
/// `"pkg.mod.Case.test_x"`.
pub fn qualified_name(module: &str, class: Option<&str>, name: &str) -> NodeKey {
    let mut parts: Vec<&str> = Vec::with_capacity(3);
    if !module.is_empty() {
        parts.push(module);
    }
    if let Some(class) = class {
        parts.push(class);
    }
    parts.push(name);
    parts.join(".")
}

/// Set-up or tear-down flavour of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixtureRole {
    Setup,
    Teardown,
}

/// Whether a node is a regular test or a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Test,
    Fixture(FixtureRole),
}

/// An outcome a test is declared to be allowed to produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Raises {
    /// Completing without raising anything.
    Nothing,
    /// Raising an error of this kind (see [`TestError::kind`]).
    Kind(String),
}

impl Raises {
    pub fn kind(kind: impl Into<String>) -> Self {
        Raises::Kind(kind.into())
    }

    fn matches(&self, raised: Option<&TestError>) -> bool {
        match (self, raised) {
            (Raises::Nothing, None) => true,
            (Raises::Kind(kind), Some(err)) => kind == err.kind(),
            _ => false,
        }
    }
}

/// Classify a raw outcome against a declared `raises` set.
///
/// Returns `(passed, is_error)`. With an empty set only a clean completion
/// passes; a `Failure` is never an error.
pub fn classify(raises: &BTreeSet<Raises>, raised: Option<&TestError>) -> (bool, bool) {
    if raises.is_empty() {
        let is_error = raised.is_some_and(|e| !e.is_failure());
        return (raised.is_none(), is_error);
    }

    let passed = raises.iter().any(|r| r.matches(raised));
    let is_error = !passed && raised.is_some_and(|e| !e.is_failure());
    (passed, is_error)
}

/// A test or fixture in the dependency graph.
pub struct Node {
    pub(crate) key: NodeKey,
    pub(crate) kind: NodeKind,
    pub(crate) class: Option<String>,
    pub(crate) body: Body,
    pub(crate) pre: Option<TestFn>,
    pub(crate) post: Option<TestFn>,
    pub(crate) dependencies: BTreeSet<NodeKey>,
    pub(crate) dependents: BTreeSet<NodeKey>,
    pub(crate) partner: Option<NodeKey>,
    pub(crate) skip: bool,
    pub(crate) expected_failure: bool,
    pub(crate) raises: BTreeSet<Raises>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) repeat: usize,
    pub(crate) strategy: Arc<dyn Strategy>,
    pub(crate) policy: Arc<dyn ResultPolicy>,
    pub(crate) resources: BTreeMap<String, Arc<dyn Resource>>,
    pub(crate) attrs: Attrs,
    result: Mutex<Option<Arc<RunResult>>>,
}

impl Node {
    pub(crate) fn from_builder(builder: NodeBuilder, defaults: &NodeDefaults) -> Self {
        Self {
            key: builder.key,
            kind: builder.kind,
            class: builder.class,
            body: builder.body,
            pre: builder.pre,
            post: builder.post,
            dependencies: BTreeSet::new(),
            dependents: BTreeSet::new(),
            partner: None,
            skip: builder.skip,
            expected_failure: builder.expected_failure,
            raises: builder.raises,
            timeout: builder.timeout.or(defaults.timeout),
            repeat: builder.repeat.max(1),
            strategy: builder
                .strategy
                .unwrap_or_else(|| Arc::clone(&defaults.strategy)),
            policy: builder.policy.unwrap_or_else(|| Arc::clone(&defaults.policy)),
            resources: builder.resources,
            attrs: builder.attrs,
            result: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// True for regular tests, false for fixtures.
    pub fn is_test(&self) -> bool {
        matches!(self.kind, NodeKind::Test)
    }

    pub fn is_fixture(&self) -> bool {
        matches!(self.kind, NodeKind::Fixture(_))
    }

    /// Name of the class the node was declared in, if any.
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn dependencies(&self) -> &BTreeSet<NodeKey> {
        &self.dependencies
    }

    pub fn dependents(&self) -> &BTreeSet<NodeKey> {
        &self.dependents
    }

    /// For a teardown fixture, the setup fixture it is paired with.
    pub fn partner(&self) -> Option<&str> {
        self.partner.as_deref()
    }

    pub fn skip(&self) -> bool {
        self.skip
    }

    pub fn expected_failure(&self) -> bool {
        self.expected_failure
    }

    pub fn raises(&self) -> &BTreeSet<Raises> {
        &self.raises
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn repeat(&self) -> usize {
        self.repeat
    }

    /// Repeated nodes and generator bodies aggregate many sub-results.
    pub fn is_multi(&self) -> bool {
        self.repeat > 1 || self.body.is_generator()
    }

    pub fn strategy(&self) -> &Arc<dyn Strategy> {
        &self.strategy
    }

    pub fn policy(&self) -> &Arc<dyn ResultPolicy> {
        &self.policy
    }

    pub fn resources(&self) -> &BTreeMap<String, Arc<dyn Resource>> {
        &self.resources
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Option<AttrValue> {
        self.attrs.set(key, value)
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<AttrValue> {
        self.attrs.remove(key)
    }

    /// Result of the most recent (or current) run.
    pub fn result(&self) -> Option<Arc<RunResult>> {
        self.result.lock().clone()
    }

    /// State of the most recent (or current) run.
    pub fn state(&self) -> Option<State> {
        self.result().and_then(|r| r.state())
    }

    /// Allocate a fresh result for a new run.
    pub(crate) fn prepare(&self) -> Arc<RunResult> {
        let result = Arc::new(RunResult::new(self));
        *self.result.lock() = Some(Arc::clone(&result));
        result
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("dependencies", &self.dependencies)
            .field("dependents", &self.dependents)
            .field("partner", &self.partner)
            .field("skip", &self.skip)
            .field("expected_failure", &self.expected_failure)
            .field("repeat", &self.repeat)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
