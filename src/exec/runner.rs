// src/exec/runner.rs

//! Process Runner Adapter.
//!
//! The executor talks to a [`ProcessRunner`] instead of `tokio::process`
//! directly, so tests can substitute a scripted fake and platforms without
//! process groups can plug in a best-effort implementation.
//!
//! - [`CommandRunner`] is the production implementation: it runs
//!   `<interpreter> <script> <target> <lock token>` in a fresh process group.
//! - [`RunningProcess`] is the handle of one spawned runner.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{RelayError, Result};
use crate::registry::ProcessIds;
use crate::types::{BoxFuture, TaskId, UserId};

use super::process_group;

/// Capacity of the stdout line channel between the reader task and the
/// executor.
const LINE_BUFFER: usize = 64;

/// Everything needed to start one runner.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub target: String,
    /// Unique token of the form `<user>_<id>`, passed as the second argument.
    pub lock_token: String,
    /// Absolute deadline after which the runner is killed.
    pub deadline: Instant,
    /// Fired when the task is cancelled.
    pub cancel: CancellationToken,
}

impl RunRequest {
    pub fn new(
        target: impl Into<String>,
        user: UserId,
        id: TaskId,
        deadline: Instant,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            target: target.into(),
            lock_token: format!("{user}_{id}"),
            deadline,
            cancel,
        }
    }
}

/// How a runner ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    Failed(String),
    TimedOut,
    Cancelled,
}

/// Handle of a spawned runner.
pub trait RunningProcess: Send {
    /// OS ids, once known. `pgid` is 0 if the group could not be resolved.
    fn ids(&self) -> Option<ProcessIds>;

    /// Resolve the process group now (used for the post-exit sweep).
    fn process_group(&mut self) -> Option<i32>;

    /// Take the stdout line stream. Returns `None` on the second call.
    fn take_lines(&mut self) -> Option<mpsc::Receiver<io::Result<String>>>;

    /// Wait for exit, honouring the request's deadline and cancel trigger.
    fn wait(&mut self) -> BoxFuture<'_, ExitOutcome>;
}

/// Spawns runners and tears down their process groups.
pub trait ProcessRunner: Send + Sync {
    fn spawn(&self, request: RunRequest) -> Result<Box<dyn RunningProcess>>;

    /// SIGTERM the group, wait `grace`, then SIGKILL.
    fn kill_group(&self, pgid: i32, grace: Duration) -> BoxFuture<'_, ()>;

    /// Kill a runner whose process group was never recorded.
    fn kill_process_tree(&self, pid: u32);
}

/// Runs the external runner script through an interpreter.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    interpreter: String,
    script: PathBuf,
}

impl CommandRunner {
    pub fn new(interpreter: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
        }
    }

    pub fn script(&self) -> &PathBuf {
        &self.script
    }
}

impl ProcessRunner for CommandRunner {
    fn spawn(&self, request: RunRequest) -> Result<Box<dyn RunningProcess>> {
        info!(
            interpreter = %self.interpreter,
            script = %self.script.display(),
            target = %request.target,
            lock = %request.lock_token,
            "starting runner process"
        );

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&self.script)
            .arg(&request.target)
            .arg(&request.lock_token)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| RelayError::Spawn(format!("{}: {e}", self.interpreter)))?;

        let Some(stdout) = child.stdout.take() else {
            return Err(RelayError::Spawn("runner stdout pipe unavailable".into()));
        };

        let (line_tx, line_rx) = mpsc::channel(LINE_BUFFER);
        let lock = request.lock_token.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line_tx.send(Ok(line)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = line_tx.send(Err(e)).await;
                        break;
                    }
                }
            }
            debug!(lock = %lock, "runner stdout closed");
        });

        // Always drain stderr so the pipe never fills; log at debug.
        if let Some(stderr) = child.stderr.take() {
            let lock = request.lock_token.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(lock = %lock, "stderr: {}", line);
                }
            });
        }

        let pid = child.id().unwrap_or_default();
        let pgid = process_group::group_of(pid).unwrap_or_default();
        debug!(pid, pgid, "runner spawned");

        Ok(Box::new(ChildProcess {
            child,
            ids: ProcessIds { pid, pgid },
            lines: Some(line_rx),
            deadline: request.deadline,
            cancel: request.cancel,
        }))
    }

    fn kill_group(&self, pgid: i32, grace: Duration) -> BoxFuture<'_, ()> {
        Box::pin(process_group::terminate_group(pgid, grace))
    }

    fn kill_process_tree(&self, pid: u32) {
        process_group::kill_process_tree(pid);
    }
}

struct ChildProcess {
    child: Child,
    ids: ProcessIds,
    lines: Option<mpsc::Receiver<io::Result<String>>>,
    deadline: Instant,
    cancel: CancellationToken,
}

impl ChildProcess {
    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(pid = self.ids.pid, error = %e, "failed to kill runner");
        }
    }
}

impl RunningProcess for ChildProcess {
    fn ids(&self) -> Option<ProcessIds> {
        Some(self.ids)
    }

    fn process_group(&mut self) -> Option<i32> {
        if self.ids.pgid == 0 {
            self.ids.pgid = process_group::group_of(self.ids.pid).unwrap_or_default();
        }
        (self.ids.pgid != 0).then_some(self.ids.pgid)
    }

    fn take_lines(&mut self) -> Option<mpsc::Receiver<io::Result<String>>> {
        self.lines.take()
    }

    fn wait(&mut self) -> BoxFuture<'_, ExitOutcome> {
        Box::pin(async move {
            let deadline = self.deadline;
            let cancel = self.cancel.clone();
            tokio::select! {
                biased;
                status = self.child.wait() => match status {
                    Ok(status) if status.success() => ExitOutcome::Success,
                    Ok(status) => ExitOutcome::Failed(format!("exit status {status}")),
                    Err(e) => ExitOutcome::Failed(e.to_string()),
                },
                _ = tokio::time::sleep_until(deadline) => {
                    self.kill().await;
                    ExitOutcome::TimedOut
                }
                _ = cancel.cancelled() => {
                    self.kill().await;
                    ExitOutcome::Cancelled
                }
            }
        })
    }
}
