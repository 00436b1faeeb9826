// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! These cover the framework itself (graph construction, configuration,
//! scheduler bookkeeping). Outcomes of test bodies are not crate errors;
//! see [`crate::node::TestError`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DagtestError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node '{node}' depends on unknown node '{dependency}'")]
    UnknownDependency { node: String, dependency: String },

    #[error("Node '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("Cycle detected in dependency graph: {0}")]
    DagCycle(String),

    #[error("Invalid partner for '{teardown}': {reason}")]
    InvalidPartner { teardown: String, reason: String },

    #[error("Invalid result policy: {0}")]
    InvalidPolicy(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DagtestError>;
