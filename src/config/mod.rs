// src/config/mod.rs

//! Configuration loading and validation for dagtest.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate thread limits, skip rules, durations and policies (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, DefaultSection, RawConfigFile, RunSection, StrategyKind, StrategySpec};
pub use validate::parse_duration;
