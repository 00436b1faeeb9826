// src/config/model.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::{RunOptions, SkipRule};
use crate::exec::policy::{BasicPolicy, ResultPolicy, ThresholdPolicy};
use crate::exec::strategy::{LimitedParallelStrategy, SerialStrategy, Strategy, UnlimitedParallelStrategy};
use crate::node::NodeDefaults;

/// Raw configuration as read from a TOML file, before validation.
///
/// ```toml
/// [run]
/// max_threads = 4
/// skip = "slow"
/// no_skip = false
/// dot = "deps.dot"
///
/// [default]
/// timeout = "2s"
/// strategy = { parallel = 8 }
/// threshold = 90.0
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Run-wide options from `[run]`.
    #[serde(default)]
    pub run: RunSection,

    /// Node defaults from `[default]`.
    #[serde(default)]
    pub default: DefaultSection,
}

/// `[run]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunSection {
    /// Cap on simultaneously running nodes; absent means unlimited.
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Skip rule: `"attr"` or `"attr=value"`.
    #[serde(default)]
    pub skip: Option<String>,

    /// Skip nothing, overriding `skip`.
    #[serde(default)]
    pub no_skip: bool,

    /// Where to write the GraphViz export after the run.
    #[serde(default)]
    pub dot: Option<PathBuf>,
}

/// `[default]` section, applied to nodes that don't declare their own.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultSection {
    /// Duration string such as `"500ms"` or `"2s"`.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub strategy: Option<StrategySpec>,

    /// Success percentage for the threshold policy; basic policy if absent.
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// `strategy = "serial"`, `strategy = "parallel"` or
/// `strategy = { parallel = N }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StrategySpec {
    Named(String),
    Limited { parallel: usize },
}

/// Validated strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    Serial,
    Parallel,
    LimitedParallel(usize),
}

impl StrategyKind {
    pub fn build(self) -> Arc<dyn Strategy> {
        match self {
            StrategyKind::Serial => Arc::new(SerialStrategy),
            StrategyKind::Parallel => Arc::new(UnlimitedParallelStrategy),
            StrategyKind::LimitedParallel(limit) => Arc::new(LimitedParallelStrategy::new(limit)),
        }
    }
}

/// Validated configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub max_threads: Option<usize>,
    pub skip: SkipRule,
    pub dot: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub strategy: StrategyKind,
    /// Validated threshold policy, if configured.
    pub threshold: Option<ThresholdPolicy>,
}

impl ConfigFile {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            max_threads: self.max_threads,
            skip: self.skip.clone(),
        }
    }

    pub fn node_defaults(&self) -> NodeDefaults {
        let policy: Arc<dyn ResultPolicy> = match self.threshold {
            Some(policy) => Arc::new(policy),
            None => Arc::new(BasicPolicy),
        };
        NodeDefaults {
            timeout: self.timeout,
            strategy: self.strategy.build(),
            policy,
        }
    }
}
