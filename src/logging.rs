// src/logging.rs

//! Diagnostics go to stderr through a `tracing-subscriber` formatter; stdout
//! is reserved for the console display surface, so rendered messages and log
//! lines never interleave.
//!
//! The filter comes from `--log-level` when given. Otherwise `TASKRELAY_LOG`
//! is used, either as a bare level (`debug`) or as full filter directives
//! (`info,taskrelay::exec=trace`). Without either, `info`.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "TASKRELAY_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(cli_level, env_value.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;
    Ok(())
}

/// Filter for the subscriber. Only env values with `=` or `,` are read as
/// directives; those that do not parse fall back to [`resolve_level`].
pub fn build_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> EnvFilter {
    let level = resolve_level(cli_level, env_value);
    let directives = env_value
        .map(str::trim)
        .filter(|v| cli_level.is_none() && (v.contains('=') || v.contains(',')));

    match directives.map(EnvFilter::try_new) {
        Some(Ok(filter)) => filter,
        _ => EnvFilter::new(level.as_str().to_lowercase()),
    }
}

/// The single level implied by the CLI flag or a bare-level env value.
pub fn resolve_level(cli_level: Option<LogLevel>, env_value: Option<&str>) -> tracing::Level {
    if let Some(level) = cli_level {
        return match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        };
    }
    env_value
        .and_then(parse_level_str)
        .unwrap_or(tracing::Level::INFO)
}

pub fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_ascii_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
