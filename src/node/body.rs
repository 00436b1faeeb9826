// src/node/body.rs

//! Callables wrapped by nodes and the context they run with.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::exec::resource::ResourceObject;
use crate::node::attrs::{AttrValue, Attrs};
use crate::result::capture::{CaptureSet, Captured};
use crate::types::NodeKey;

/// Kind name reported for [`TestError::Failure`].
pub const ASSERTION_KIND: &str = "AssertionError";

/// Something a test body raised.
///
/// `Failure` is the assertion type: it maps to FAIL (or XFAIL). Any other
/// raised error maps to ERROR unless its kind is declared in the node's
/// [`Raises`](crate::node::Raises) set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestError {
    Failure(String),
    Error { kind: String, message: String },
}

impl TestError {
    pub fn failure(message: impl Into<String>) -> Self {
        TestError::Failure(message.into())
    }

    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        TestError::Error {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            TestError::Failure(_) => ASSERTION_KIND,
            TestError::Error { kind, .. } => kind,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            TestError::Failure(message) | TestError::Error { message, .. } => message,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TestError::Failure(_))
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for TestError {}

/// Outcome of one call of a test, fixture or pre/post callable.
pub type TestOutcome = Result<(), TestError>;

/// Plain callable: fixture bodies, single tests, pre/post callables.
pub type TestFn = Arc<dyn Fn(&TestContext) -> TestOutcome + Send + Sync>;

/// Callable for one generated sub-test, with its positional and keyword
/// arguments.
pub type SubTestFn =
    Arc<dyn Fn(&TestContext, &[AttrValue], &BTreeMap<String, AttrValue>) -> TestOutcome + Send + Sync>;

/// Generator body: yields the sub-tests to run.
pub type GeneratorFn = Arc<dyn Fn(&TestContext) -> Result<Vec<SubTest>, TestError> + Send + Sync>;

/// The callable a node wraps.
#[derive(Clone)]
pub enum Body {
    Call(TestFn),
    Generator(GeneratorFn),
}

impl Body {
    pub fn call<F>(f: F) -> Self
    where
        F: Fn(&TestContext) -> TestOutcome + Send + Sync + 'static,
    {
        Body::Call(Arc::new(f))
    }

    pub fn generator<F>(f: F) -> Self
    where
        F: Fn(&TestContext) -> Result<Vec<SubTest>, TestError> + Send + Sync + 'static,
    {
        Body::Generator(Arc::new(f))
    }

    pub fn is_generator(&self) -> bool {
        matches!(self, Body::Generator(_))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Call(_) => f.write_str("Body::Call(..)"),
            Body::Generator(_) => f.write_str("Body::Generator(..)"),
        }
    }
}

/// One item produced by a generator body.
///
/// Every part but the callable may be omitted: a missing name defaults to
/// the generating node's key, missing arguments default to empty.
#[derive(Clone)]
pub struct SubTest {
    pub name: Option<String>,
    pub call: SubTestFn,
    pub args: Vec<AttrValue>,
    pub kwargs: BTreeMap<String, AttrValue>,
}

impl SubTest {
    pub fn new<F>(call: F) -> Self
    where
        F: Fn(&TestContext, &[AttrValue], &BTreeMap<String, AttrValue>) -> TestOutcome
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: None,
            call: Arc::new(call),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Wrap a callable that ignores its arguments.
    pub fn simple<F>(call: F) -> Self
    where
        F: Fn(&TestContext) -> TestOutcome + Send + Sync + 'static,
    {
        Self::new(move |ctx, _, _| call(ctx))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn arg(mut self, value: impl Into<AttrValue>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for SubTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubTest")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("kwargs", &self.kwargs)
            .finish_non_exhaustive()
    }
}

/// Per-call context handed to every callable.
///
/// Each phase (and each sub-invocation) gets a fresh context, so output
/// written here never bleeds across phases or concurrent invocations.
pub struct TestContext {
    key: NodeKey,
    slot: String,
    attrs: Attrs,
    resources: BTreeMap<String, Arc<ResourceObject>>,
    capture: Mutex<CaptureSet>,
}

impl TestContext {
    pub(crate) fn new(
        key: NodeKey,
        slot: String,
        attrs: Attrs,
        resources: BTreeMap<String, Arc<ResourceObject>>,
    ) -> Self {
        Self {
            key,
            slot,
            attrs,
            resources,
            capture: Mutex::new(CaptureSet::new()),
        }
    }

    /// Key of the node being executed.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Id of the message slot this call records into (`"PRE"`, `"TEST"`,
    /// `"POST"` or a sub-invocation id).
    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// A resource declared with [`NodeBuilder::require`](crate::node::NodeBuilder::require).
    pub fn resource(&self, name: &str) -> Option<&Arc<ResourceObject>> {
        self.resources.get(name)
    }

    /// Append to the captured standard output.
    pub fn print(&self, text: impl AsRef<str>) {
        self.write("stdout", text);
    }

    /// Append a line to the captured standard output.
    pub fn println(&self, text: impl AsRef<str>) {
        let mut line = text.as_ref().to_string();
        line.push('\n');
        self.write("stdout", line);
    }

    /// Append to the captured standard error.
    pub fn eprint(&self, text: impl AsRef<str>) {
        self.write("stderr", text);
    }

    /// Append to an arbitrary named capture channel.
    pub fn write(&self, channel: &str, text: impl AsRef<str>) {
        self.capture.lock().write(channel, text.as_ref());
    }

    /// Drain everything captured so far.
    pub(crate) fn retrieve(&self) -> Vec<Captured> {
        self.capture.lock().retrieve()
    }
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("key", &self.key)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}
