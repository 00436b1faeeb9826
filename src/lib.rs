// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod node;
pub mod result;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::model::ConfigFile;
use crate::engine::{Observer, Queue, RunOptions, RunReport, SkipRule, TracingObserver};

pub use crate::dag::{Registry, Scope, TestGraph, wire_scopes};
pub use crate::errors::DagtestError;
pub use crate::node::{
    AttrValue, Body, Node, NodeBuilder, NodeDefaults, Raises, SubTest, TestContext, TestError,
    TestOutcome, qualified_name,
};
pub use crate::result::RunResult;
pub use crate::types::{NodeKey, Phase, State};

/// Run every node of `graph` once and return the report.
///
/// Each call starts from a fresh result for every node, so the same graph
/// can be run repeatedly. Must be called inside a multi-thread tokio
/// runtime: test bodies run on the blocking pool.
pub async fn run(graph: &TestGraph, options: RunOptions, observer: Arc<dyn Observer>) -> RunReport {
    Queue::new(graph, options, observer).run().await
}

/// Load the configuration named by `--config`, or `Dagtest.toml` if it
/// exists, or the built-in defaults.
///
/// Harnesses call this before registering nodes so that
/// [`ConfigFile::node_defaults`] can seed [`Registry::with_defaults`].
pub fn load_config(args: &CliArgs) -> Result<ConfigFile> {
    match &args.config {
        Some(path) => load_and_validate(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => {
            let path = default_config_path();
            if path.is_file() {
                load_and_validate(&path)
                    .with_context(|| format!("loading config from {}", path.display()))
            } else {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(ConfigFile::default())
            }
        }
    }
}

/// High-level entry point for harness binaries.
///
/// This wires together:
/// - config loading, with CLI flags taking precedence
/// - dry-run listing
/// - the scheduler, reporting transitions through `tracing`
/// - optional GraphViz export of the finished run
///
/// Returns whether the run passed.
pub async fn run_with_args(graph: &TestGraph, args: &CliArgs) -> Result<bool> {
    let cfg = load_config(args)?;
    let options = merge_options(&cfg, args)?;

    if args.dry_run {
        list_nodes(graph, &options);
        return Ok(true);
    }

    let report = run(graph, options, Arc::new(TracingObserver)).await;

    if let Some(path) = args.dot.as_ref().or(cfg.dot.as_ref()) {
        std::fs::write(path, graph.to_dot("dagtest"))
            .with_context(|| format!("writing graph to {}", path.display()))?;
        info!(path = %path.display(), "wrote dependency graph");
    }

    for failure in &report.framework_errors {
        tracing::error!(node = %failure.node, error = %failure.message, "framework error");
    }
    for failure in &report.resource_errors {
        tracing::warn!(resource = %failure.resource, error = %failure.error, "resource tear-down failed");
    }

    Ok(report.passed())
}

fn merge_options(cfg: &ConfigFile, args: &CliArgs) -> Result<RunOptions> {
    let mut options = cfg.run_options();

    if let Some(limit) = args.max_threads {
        anyhow::ensure!(limit >= 1, "--max-threads must be >= 1 (got 0)");
        options.max_threads = Some(limit);
    }
    if args.no_skip {
        options.skip = SkipRule::Never;
    } else if let Some(rule) = &args.skip {
        options.skip = SkipRule::parse(rule)?;
    }

    Ok(options)
}

/// Dry-run output: every test in registration order, and whether the
/// active skip rule selects it.
fn list_nodes(graph: &TestGraph, options: &RunOptions) {
    info!(tests = graph.tests().count(), "dagtest dry-run");
    for node in graph.tests() {
        info!(
            node = %node.key(),
            skipped = options.skip.should_skip(node),
            dependencies = node.dependencies().len(),
            "test"
        );
    }
    debug!("dry-run complete (no execution)");
}
