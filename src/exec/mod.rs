// src/exec/mod.rs

//! Node execution layer.
//!
//! - [`runner`] drives one node through its PRE/TEST/POST phases.
//! - [`strategy`] decides how a multi-result node's sub-invocations run
//!   (serially, or as tokio tasks with an optional cap).
//! - [`policy`] turns sub-invocation counts into a pass/fail/error verdict.
//! - [`resource`] pools reusable test resources with dirty tracking.

pub mod policy;
pub mod resource;
pub mod runner;
pub mod strategy;

pub use policy::{BasicPolicy, Counts, ResultPolicy, ThresholdPolicy, Verdict};
pub use resource::{Resource, ResourceError, ResourceManager, ResourceObject, ResourceValue};
pub use runner::{ExecEnv, execute_node};
pub use strategy::{LimitedParallelStrategy, SerialStrategy, SpawnBatch, Strategy, UnlimitedParallelStrategy};
