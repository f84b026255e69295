// src/config/mod.rs

//! Configuration loading and validation for taskrelay.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate the raw model and turn it into typed settings (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path, resolve_runner_script};
pub use model::{
    AccessSection, ConfigFile, QueueSection, RawConfigFile, RawRunnerSection,
    RawSubscriptionSection, RawTargetsSection, RunnerSettings, SubscriptionSettings,
    DEFAULT_LINK_PATTERN, DEFAULT_TARGET_PATTERN,
};
