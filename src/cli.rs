// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::UserId;

/// Command-line arguments for `taskrelay`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskrelay",
    version,
    about = "Run submitted targets one at a time through an external runner, with live progress and cancellation.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `TaskRelay.toml` in the current working directory. A missing
    /// default file means "all defaults".
    #[arg(long, value_name = "PATH", default_value = "TaskRelay.toml")]
    pub config: String,

    /// Runner script to execute for every target.
    ///
    /// Overrides `TASKRELAY_RUNNER` and `[runner].script`.
    #[arg(long, value_name = "PATH")]
    pub runner: Option<PathBuf>,

    /// User id of the console operator (checked against the allow-list).
    #[arg(long, value_name = "ID", default_value_t = 1)]
    pub user: UserId,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKRELAY_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate the config, print the effective settings, and exit.
    #[arg(long)]
    pub dry_run: bool,
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
