// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`runner`] is the Process Runner Adapter: the [`ProcessRunner`] trait
//!   plus the production `tokio::process` implementation.
//! - [`process_group`] holds the unix process-group signalling helpers.
//! - [`classify`] turns runner output lines into control events.
//! - [`executor`] drives one task from spawn to terminal status.
//! - [`worker`] is the single queue consumer that runs tasks one at a time.

pub mod classify;
pub mod executor;
pub mod process_group;
pub mod runner;
pub mod worker;

use std::time::Duration;

use crate::config::ConfigFile;
use crate::display::templates;
use crate::types::TaskId;

pub use executor::TaskExecutor;
pub use runner::{CommandRunner, ExitOutcome, ProcessRunner, RunRequest, RunningProcess};
pub use worker::spawn_queue_worker;

/// Timing knobs of the executor.
#[derive(Debug, Clone, Copy)]
pub struct ExecSettings {
    /// Absolute per-task deadline.
    pub timeout: Duration,
    /// Minimum spacing of progress pushes.
    pub status_interval: Duration,
    /// Grace between SIGTERM and SIGKILL in the post-exit group sweep.
    pub cleanup_grace: Duration,
}

impl Default for ExecSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5 * 60),
            status_interval: Duration::from_secs(1),
            cleanup_grace: Duration::from_millis(800),
        }
    }
}

impl From<&ConfigFile> for ExecSettings {
    fn from(cfg: &ConfigFile) -> Self {
        Self {
            timeout: cfg.runner.timeout,
            status_interval: cfg.runner.status_interval,
            cleanup_grace: cfg.runner.cleanup_grace,
        }
    }
}

/// How a task ended, as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalStatus {
    /// The runner (or its output pipe) could not be started.
    StartFailed,
    TimedOut,
    /// Non-zero exit or output read error.
    Failed(String),
    /// Clean exit; carries the last status line the runner printed.
    Succeeded(String),
    /// Clean exit without any status line.
    Completed,
    Cancelled,
}

impl TerminalStatus {
    pub fn render(&self, id: TaskId) -> String {
        match self {
            TerminalStatus::StartFailed => templates::failed_to_start(id),
            TerminalStatus::TimedOut => templates::timed_out(id),
            TerminalStatus::Failed(_) => templates::failed(id),
            TerminalStatus::Succeeded(status) => status.clone(),
            TerminalStatus::Completed => templates::completed(id),
            TerminalStatus::Cancelled => templates::terminated_by_user(id),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TerminalStatus::Succeeded(_) | TerminalStatus::Completed)
    }
}
