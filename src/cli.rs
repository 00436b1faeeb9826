// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! dagtest has no binary of its own: a harness binary registers its
//! nodes, parses [`CliArgs`] and hands both to
//! [`run_with_args`](crate::run_with_args).

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments understood by dagtest harnesses.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "dagtest",
    version,
    about = "Run a dependency graph of tests and fixtures.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Dagtest.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Maximum number of nodes running at once.
    #[arg(short = 'm', long, value_name = "N")]
    pub max_threads: Option<usize>,

    /// Skip nodes with this attribute (`key`) or attribute value (`key=value`).
    #[arg(short = 's', long, value_name = "RULE")]
    pub skip: Option<String>,

    /// Skip nothing, even nodes declared as skipped. Overrides `--skip`.
    #[arg(long)]
    pub no_skip: bool,

    /// List the tests that would run without executing anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Write the dependency graph as GraphViz DOT to this path after the run.
    #[arg(long, value_name = "PATH")]
    pub dot: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAGTEST_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
