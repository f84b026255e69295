// src/exec/executor.rs

//! Task Executor: drives one promoted item from spawn to terminal status.
//!
//! States: starting → running → {succeeded, failed, timed out, cancelled}.
//!
//! Cancellation is observed by polling the registry after every classified
//! line (and once more when the stream closes). The latency bound is
//! therefore one output line; a runner that goes silent is still torn down
//! because cancellation kills its process group, which closes the stream.

use std::sync::Arc;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::display::{DisplayAggregator, templates};
use crate::registry::{QueuedItem, TaskRegistry};

use super::classify::{LineClassifier, OutputEvent, StatusThrottle};
use super::runner::{ExitOutcome, ProcessRunner, RunRequest, RunningProcess};
use super::{ExecSettings, TerminalStatus};

#[derive(Clone)]
pub struct TaskExecutor {
    registry: Arc<TaskRegistry>,
    runner: Arc<dyn ProcessRunner>,
    display: Arc<DisplayAggregator>,
    settings: ExecSettings,
}

impl TaskExecutor {
    pub fn new(
        registry: Arc<TaskRegistry>,
        runner: Arc<dyn ProcessRunner>,
        display: Arc<DisplayAggregator>,
        settings: ExecSettings,
    ) -> Self {
        Self {
            registry,
            runner,
            display,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn display(&self) -> &Arc<DisplayAggregator> {
        &self.display
    }

    /// Run a promoted item to completion and render its terminal line.
    ///
    /// Never fails: every error is resolved into a [`TerminalStatus`].
    pub async fn run(&self, item: &QueuedItem, cancel: CancellationToken) -> TerminalStatus {
        let status = self.execute(item, &cancel).await;
        info!(
            user = item.user,
            task_id = item.id,
            target = %item.target,
            status = ?status,
            "task finished"
        );
        self.finish(item, &status).await;
        status
    }

    fn still_active(&self, item: &QueuedItem) -> bool {
        self.registry.contains_task(item.user, item.id)
    }

    async fn execute(&self, item: &QueuedItem, cancel: &CancellationToken) -> TerminalStatus {
        if cancel.is_cancelled() || !self.still_active(item) {
            info!(user = item.user, task_id = item.id, "cancelled before spawn");
            return TerminalStatus::Cancelled;
        }

        // starting
        let deadline = Instant::now() + self.settings.timeout;
        let request = RunRequest::new(&item.target, item.user, item.id, deadline, cancel.clone());
        let mut process = match self.runner.spawn(request) {
            Ok(process) => process,
            Err(err) => {
                warn!(user = item.user, task_id = item.id, error = %err, "runner failed to start");
                return TerminalStatus::StartFailed;
            }
        };

        if let Some(ids) = process.ids() {
            if !self.registry.attach_process(item.user, item.id, ids) {
                info!(user = item.user, task_id = item.id, "cancelled while starting; killing runner");
                self.kill_unattached(process.as_mut()).await;
                return TerminalStatus::Cancelled;
            }
        }

        let Some(mut lines) = process.take_lines() else {
            warn!(user = item.user, task_id = item.id, "runner output stream unavailable");
            self.kill_unattached(process.as_mut()).await;
            return TerminalStatus::StartFailed;
        };

        // running
        let mut classifier = LineClassifier::new();
        let mut throttle = StatusThrottle::new(self.settings.status_interval);
        let mut last_status: Option<String> = None;
        let mut read_error: Option<String> = None;

        loop {
            let next = tokio::select! {
                biased;
                line = lines.recv() => line,
                _ = sleep_until(deadline) => {
                    debug!(task_id = item.id, "deadline reached while streaming");
                    break;
                }
            };

            let raw = match next {
                Some(Ok(raw)) => raw,
                Some(Err(err)) => {
                    warn!(task_id = item.id, error = %err, "runner output read failed");
                    read_error = Some(err.to_string());
                    break;
                }
                None => break,
            };

            let Some(event) = classifier.classify(&raw) else {
                continue;
            };
            match event {
                OutputEvent::LoginViaConsole => {
                    info!(task_id = item.id, "runner asks for console login");
                    self.display.notice(item, templates::login_console(item.id)).await;
                }
                OutputEvent::LoginViaLink(link) => {
                    info!(task_id = item.id, link = %link, "runner produced a login link");
                    self.display.notice(item, templates::login_link(item.id, &link)).await;
                }
                OutputEvent::Status(status) => {
                    if throttle.ready() {
                        self.display.progress(item, &status).await;
                    }
                    last_status = Some(status);
                }
                OutputEvent::Noise => {
                    debug!(task_id = item.id, "runner: {}", raw.trim());
                }
            }

            if !self.still_active(item) {
                info!(user = item.user, task_id = item.id, "task cancelled while running");
                return TerminalStatus::Cancelled;
            }
        }

        if !self.still_active(item) {
            return TerminalStatus::Cancelled;
        }

        let outcome = process.wait().await;

        // Sweep the group even on a clean exit; the runner may leave children.
        if let Some(pgid) = process.process_group() {
            self.runner.kill_group(pgid, self.settings.cleanup_grace).await;
        }

        match outcome {
            ExitOutcome::TimedOut => TerminalStatus::TimedOut,
            ExitOutcome::Cancelled => TerminalStatus::Cancelled,
            ExitOutcome::Failed(_) if !self.still_active(item) => TerminalStatus::Cancelled,
            ExitOutcome::Failed(reason) => TerminalStatus::Failed(reason),
            ExitOutcome::Success => match (read_error, last_status) {
                (Some(err), _) => TerminalStatus::Failed(err),
                (None, Some(status)) => TerminalStatus::Succeeded(status),
                (None, None) => TerminalStatus::Completed,
            },
        }
    }

    /// Kill a runner the registry does not know the process of.
    async fn kill_unattached(&self, process: &mut dyn RunningProcess) {
        match process.process_group() {
            Some(pgid) => self.runner.kill_group(pgid, self.settings.cleanup_grace).await,
            None => {
                if let Some(ids) = process.ids() {
                    self.runner.kill_process_tree(ids.pid);
                }
            }
        }
    }

    /// Unregister, clear "current", and render the terminal line.
    async fn finish(&self, item: &QueuedItem, status: &TerminalStatus) {
        self.registry.unregister_task(item.user, item.id);
        self.registry.set_current(None);
        self.display.finish(item, &status.render(item.id)).await;
    }
}
