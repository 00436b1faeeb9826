// src/engine/mod.rs

//! Orchestration engine for dagtest.
//!
//! This module ties together:
//! - the [`Queue`] scheduler that walks the graph concurrently
//! - the readiness and skip-propagation rules it applies ([`readiness`])
//! - skip rules applied before scheduling ([`skip`])
//! - the [`Observer`] notified on every state transition
//! - the [`RunReport`] returned at the end of a run

pub mod observer;
pub mod queue;
pub mod readiness;
pub mod report;
pub mod skip;

pub use observer::{NullObserver, Observer, TracingObserver};
pub use queue::{Queue, RunOptions};
pub use report::{FrameworkError, NodeOutcome, RunReport, Summary};
pub use skip::SkipRule;
