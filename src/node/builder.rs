// src/node/builder.rs

//! Declarative construction of nodes.
//!
//! A builder collects a plain callable plus the modifiers declared for it
//! (skip, expected failure, dependencies, timeout, repeat, strategy, policy,
//! required resources, attributes). The [`Registry`](crate::dag::Registry)
//! turns it into an immutable [`Node`](crate::node::Node).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use crate::exec::policy::{BasicPolicy, ResultPolicy};
use crate::exec::resource::Resource;
use crate::exec::strategy::{SerialStrategy, Strategy};
use crate::node::attrs::{AttrValue, Attrs};
use crate::node::body::{Body, TestContext, TestFn, TestOutcome};
use crate::node::{FixtureRole, NodeKind, Raises};
use crate::types::NodeKey;

/// Values applied to nodes that did not declare their own.
#[derive(Debug, Clone)]
pub struct NodeDefaults {
    pub timeout: Option<Duration>,
    pub strategy: Arc<dyn Strategy>,
    pub policy: Arc<dyn ResultPolicy>,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            timeout: None,
            strategy: Arc::new(SerialStrategy),
            policy: Arc::new(BasicPolicy),
        }
    }
}

/// Builder for a test or fixture node.
pub struct NodeBuilder {
    pub(crate) key: NodeKey,
    pub(crate) kind: NodeKind,
    pub(crate) class: Option<String>,
    pub(crate) body: Body,
    pub(crate) pre: Option<TestFn>,
    pub(crate) post: Option<TestFn>,
    pub(crate) depends: Vec<NodeKey>,
    pub(crate) skip: bool,
    pub(crate) expected_failure: bool,
    pub(crate) raises: BTreeSet<Raises>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) repeat: usize,
    pub(crate) strategy: Option<Arc<dyn Strategy>>,
    pub(crate) policy: Option<Arc<dyn ResultPolicy>>,
    pub(crate) resources: BTreeMap<String, Arc<dyn Resource>>,
    pub(crate) attrs: Attrs,
}

impl NodeBuilder {
    fn with_kind(key: impl Into<NodeKey>, kind: NodeKind, body: Body) -> Self {
        Self {
            key: key.into(),
            kind,
            class: None,
            body,
            pre: None,
            post: None,
            depends: Vec::new(),
            skip: false,
            expected_failure: false,
            raises: BTreeSet::new(),
            timeout: None,
            repeat: 1,
            strategy: None,
            policy: None,
            resources: BTreeMap::new(),
            attrs: Attrs::new(),
        }
    }

    /// A regular test wrapping `f`.
    pub fn test<F>(key: impl Into<NodeKey>, f: F) -> Self
    where
        F: Fn(&TestContext) -> TestOutcome + Send + Sync + 'static,
    {
        Self::with_kind(key, NodeKind::Test, Body::call(f))
    }

    /// A regular test with an explicit body (e.g. a generator).
    pub fn test_body(key: impl Into<NodeKey>, body: Body) -> Self {
        Self::with_kind(key, NodeKind::Test, body)
    }

    /// A set-up fixture.
    pub fn setup<F>(key: impl Into<NodeKey>, f: F) -> Self
    where
        F: Fn(&TestContext) -> TestOutcome + Send + Sync + 'static,
    {
        Self::with_kind(key, NodeKind::Fixture(FixtureRole::Setup), Body::call(f))
    }

    /// A tear-down fixture.
    pub fn teardown<F>(key: impl Into<NodeKey>, f: F) -> Self
    where
        F: Fn(&TestContext) -> TestOutcome + Send + Sync + 'static,
    {
        Self::with_kind(key, NodeKind::Fixture(FixtureRole::Teardown), Body::call(f))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Callable run in the PRE phase, immediately before the body.
    pub fn pre<F>(mut self, f: F) -> Self
    where
        F: Fn(&TestContext) -> TestOutcome + Send + Sync + 'static,
    {
        self.pre = Some(Arc::new(f));
        self
    }

    /// Callable run in the POST phase, even if the body failed.
    pub fn post<F>(mut self, f: F) -> Self
    where
        F: Fn(&TestContext) -> TestOutcome + Send + Sync + 'static,
    {
        self.post = Some(Arc::new(f));
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<NodeKey>) -> Self {
        self.depends.push(dependency.into());
        self
    }

    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Mark the test as expected to fail.
    pub fn failing(mut self) -> Self {
        self.expected_failure = true;
        self
    }

    /// Declare outcomes that count as a pass.
    pub fn raises(mut self, allowed: impl IntoIterator<Item = Raises>) -> Self {
        self.raises.extend(allowed);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn repeat(mut self, count: usize) -> Self {
        self.repeat = count;
        self
    }

    pub fn strategy(mut self, strategy: impl Strategy + 'static) -> Self {
        self.strategy = Some(Arc::new(strategy));
        self
    }

    pub fn policy(mut self, policy: impl ResultPolicy + 'static) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Require a resource, made available to the body under `name`.
    pub fn require(mut self, name: impl Into<String>, resource: Arc<dyn Resource>) -> Self {
        self.resources.insert(name.into(), resource);
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.set(key, value);
        self
    }
}
