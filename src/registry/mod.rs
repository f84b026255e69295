// src/registry/mod.rs

//! Task registry: the single owner of all mutable orchestration state.
//!
//! The registry holds:
//! - per-user id counters
//! - the active-task table and the "current task" slot
//! - the queued-item lookup table (so cancellation can find waiting items)
//! - the display-unit cache (rows, controls, pending counts)
//!
//! All of the above sit behind one `parking_lot::RwLock` that is only ever
//! held for map manipulation, never across an `.await`. The pending FIFO is a
//! separate bounded `tokio::sync::mpsc` channel used purely as the
//! producer → worker handoff.
//!
//! Cancellation is split in two: detaching a task (lock-only, returns
//! immediately) and tearing down its process group (signals + grace sleep,
//! done after the lock is released).

pub mod display_cache;
pub mod item;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::display::Controls;
use crate::errors::{RelayError, Result};
use crate::exec::ProcessRunner;
use crate::types::{DisplayRef, QueueFullPolicy, TaskId, UserId};

pub use display_cache::DisplayCache;
pub use item::{CurrentTask, ItemState, ProcessIds, QueuedItem, Task};

/// Knobs the registry needs from the configuration.
#[derive(Debug, Clone, Copy)]
pub struct RegistrySettings {
    pub capacity: usize,
    pub when_full: QueueFullPolicy,
    /// Wait between SIGTERM and SIGKILL when tearing down a cancelled task.
    pub kill_grace: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            capacity: 100,
            when_full: QueueFullPolicy::Reject,
            kill_grace: Duration::from_millis(500),
        }
    }
}

impl From<&ConfigFile> for RegistrySettings {
    fn from(cfg: &ConfigFile) -> Self {
        Self {
            capacity: cfg.queue.capacity,
            when_full: cfg.queue.when_full,
            kill_grace: cfg.runner.kill_grace,
        }
    }
}

/// Consumer end of the pending FIFO. Owned by the queue worker.
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::Receiver<Arc<QueuedItem>>,
}

impl QueueReceiver {
    pub async fn recv(&mut self) -> Option<Arc<QueuedItem>> {
        self.rx.recv().await
    }
}

/// Result of [`TaskRegistry::cancel`].
///
/// Tells the caller who owns the row's terminal rendering:
/// - `Waiting`: the item never started; the caller renders it as cancelled.
/// - `Running`: the task was detached and its process torn down; the
///   executor renders the terminal row once it notices.
/// - `NotFound`: already finished or unknown.
#[derive(Debug, Clone)]
pub enum CancelOutcome {
    Waiting(Arc<QueuedItem>),
    Running,
    NotFound,
}

/// What has to be torn down after a task was detached.
#[derive(Debug)]
struct Teardown {
    user: UserId,
    id: TaskId,
    process: Option<ProcessIds>,
}

#[derive(Debug, Default)]
struct RegistryState {
    counters: HashMap<UserId, TaskId>,
    tasks: HashMap<UserId, HashMap<TaskId, Task>>,
    queued: HashMap<UserId, HashMap<TaskId, Arc<QueuedItem>>>,
    current: Option<CurrentTask>,
    displays: DisplayCache,
}

impl RegistryState {
    fn remove_task(&mut self, user: UserId, id: TaskId) -> Option<Task> {
        let tasks = self.tasks.get_mut(&user)?;
        let task = tasks.remove(&id);
        if tasks.is_empty() {
            self.tasks.remove(&user);
        }
        task
    }

    fn remove_queued(&mut self, user: UserId, id: TaskId) -> Option<Arc<QueuedItem>> {
        let items = self.queued.get_mut(&user)?;
        let item = items.remove(&id);
        if items.is_empty() {
            self.queued.remove(&user);
        }
        item
    }

    /// Remove an active task and fire its cancellation trigger.
    fn detach_task(&mut self, user: UserId, id: TaskId) -> Option<Teardown> {
        let task = self.remove_task(user, id)?;
        task.cancel.cancel();
        Some(Teardown {
            user,
            id,
            process: task.process,
        })
    }
}

/// Process-wide orchestration state. Constructed once at service start and
/// shared as `Arc<TaskRegistry>`.
pub struct TaskRegistry {
    state: RwLock<RegistryState>,
    queue_tx: mpsc::Sender<Arc<QueuedItem>>,
    settings: RegistrySettings,
    runner: Arc<dyn ProcessRunner>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("settings", &self.settings)
            .field("queue_len", &self.queue_len())
            .finish_non_exhaustive()
    }
}

impl TaskRegistry {
    /// Create the registry and the consumer end of its pending FIFO.
    ///
    /// `runner` provides the process-group teardown primitives used when a
    /// running task is cancelled.
    pub fn new(settings: RegistrySettings, runner: Arc<dyn ProcessRunner>) -> (Arc<Self>, QueueReceiver) {
        let capacity = settings.capacity.max(1);
        let (queue_tx, rx) = mpsc::channel(capacity);
        let registry = Arc::new(Self {
            state: RwLock::new(RegistryState::default()),
            queue_tx,
            settings,
            runner,
        });
        (registry, QueueReceiver { rx })
    }

    pub fn settings(&self) -> RegistrySettings {
        self.settings
    }

    // ---- ids -------------------------------------------------------------

    /// Next id for `user`. Ids start at 1 and are never reused.
    pub fn next_id(&self, user: UserId) -> TaskId {
        let mut state = self.state.write();
        let counter = state.counters.entry(user).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Reserve `count` contiguous ids for one batch submission.
    pub fn next_ids(&self, user: UserId, count: usize) -> Vec<TaskId> {
        let mut state = self.state.write();
        let counter = state.counters.entry(user).or_insert(0);
        (0..count)
            .map(|_| {
                *counter += 1;
                *counter
            })
            .collect()
    }

    // ---- active tasks ----------------------------------------------------

    pub fn register_task(&self, task: Task) {
        let mut state = self.state.write();
        state
            .tasks
            .entry(task.user)
            .or_default()
            .insert(task.id, task);
    }

    /// Remove a task; removing the last one also drops the user's table.
    pub fn unregister_task(&self, user: UserId, id: TaskId) -> bool {
        self.state.write().remove_task(user, id).is_some()
    }

    pub fn contains_task(&self, user: UserId, id: TaskId) -> bool {
        self.state
            .read()
            .tasks
            .get(&user)
            .is_some_and(|tasks| tasks.contains_key(&id))
    }

    pub fn count_user_tasks(&self, user: UserId) -> usize {
        self.state.read().tasks.get(&user).map_or(0, HashMap::len)
    }

    pub fn active_users(&self) -> usize {
        self.state.read().tasks.len()
    }

    pub fn process_of(&self, user: UserId, id: TaskId) -> Option<ProcessIds> {
        self.state
            .read()
            .tasks
            .get(&user)
            .and_then(|tasks| tasks.get(&id))
            .and_then(Task::process)
    }

    /// Ids of the running tasks of `user` that render into `display`.
    pub fn running_tasks_for(&self, user: UserId, display: DisplayRef) -> Vec<TaskId> {
        let state = self.state.read();
        let mut ids: Vec<TaskId> = state
            .tasks
            .get(&user)
            .map(|tasks| {
                tasks
                    .values()
                    .filter(|t| t.display == display)
                    .map(|t| t.id)
                    .collect()
            })
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    pub fn set_current(&self, current: Option<CurrentTask>) {
        self.state.write().current = current;
    }

    pub fn current(&self) -> Option<CurrentTask> {
        self.state.read().current
    }

    /// Promote a dequeued item to a running task.
    ///
    /// Under one critical section: refuse if the item was cancelled,
    /// otherwise mark it started, register the task and make it current.
    pub fn promote(&self, item: &QueuedItem, cancel: CancellationToken) -> bool {
        let mut state = self.state.write();
        if !item.try_start() {
            return false;
        }
        state
            .tasks
            .entry(item.user)
            .or_default()
            .insert(item.id, Task::new(item, cancel));
        state.current = Some(CurrentTask {
            user: item.user,
            id: item.id,
        });
        true
    }

    /// Record the spawned process of a task.
    ///
    /// Returns false when the task is no longer registered (it was cancelled
    /// while the process was starting); the caller must then kill it.
    pub fn attach_process(&self, user: UserId, id: TaskId, ids: ProcessIds) -> bool {
        let mut state = self.state.write();
        match state.tasks.get_mut(&user).and_then(|t| t.get_mut(&id)) {
            Some(task) => {
                task.process = Some(ids);
                true
            }
            None => false,
        }
    }

    // ---- queue -----------------------------------------------------------

    /// Number of items currently buffered in the pending FIFO.
    pub fn queue_len(&self) -> usize {
        self.queue_tx.max_capacity() - self.queue_tx.capacity()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_tx.max_capacity()
    }

    /// Record `item` in the lookup table, then push it onto the FIFO.
    ///
    /// The lookup entry exists before the push so a cancel arriving right
    /// after submission always finds the item. On failure the entry is
    /// removed again.
    pub async fn enqueue(&self, item: Arc<QueuedItem>) -> Result<()> {
        let (user, id) = (item.user, item.id);
        {
            let mut state = self.state.write();
            state
                .queued
                .entry(user)
                .or_default()
                .insert(id, Arc::clone(&item));
        }

        let pushed = match self.settings.when_full {
            QueueFullPolicy::Reject => match self.queue_tx.try_send(item) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => Err(RelayError::QueueFull {
                    capacity: self.queue_capacity(),
                }),
                Err(TrySendError::Closed(_)) => Err(RelayError::QueueClosed),
            },
            QueueFullPolicy::Block => self
                .queue_tx
                .send(item)
                .await
                .map_err(|_| RelayError::QueueClosed),
        };

        match pushed {
            Ok(()) => {
                debug!(user, task_id = id, queue_len = self.queue_len(), "item enqueued");
                Ok(())
            }
            Err(err) => {
                self.state.write().remove_queued(user, id);
                warn!(user, task_id = id, error = %err, "item not enqueued");
                Err(err)
            }
        }
    }

    pub fn remove_queued(&self, user: UserId, id: TaskId) {
        self.state.write().remove_queued(user, id);
    }

    pub fn queued_item(&self, user: UserId, id: TaskId) -> Option<Arc<QueuedItem>> {
        self.state
            .read()
            .queued
            .get(&user)
            .and_then(|items| items.get(&id))
            .cloned()
    }

    /// Items of `user` (waiting or started) that render into `display`,
    /// ordered by id.
    pub fn queued_items_for(&self, user: UserId, display: DisplayRef) -> Vec<Arc<QueuedItem>> {
        let state = self.state.read();
        let mut items: Vec<Arc<QueuedItem>> = state
            .queued
            .get(&user)
            .map(|items| {
                items
                    .values()
                    .filter(|i| i.display == display)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        items.sort_unstable_by_key(|i| i.id);
        items
    }

    // ---- cancellation ----------------------------------------------------

    /// Cancel a queued item.
    ///
    /// Marks the item cancelled and drops its lookup entry; then, outside the
    /// lock, also cancels the task in case the item was already promoted.
    /// Returns whether a queued entry was found.
    pub async fn cancel_queued_item(&self, user: UserId, id: TaskId) -> bool {
        let found = {
            let mut state = self.state.write();
            match state.remove_queued(user, id) {
                Some(item) => {
                    item.mark_cancelled();
                    true
                }
                None => false,
            }
        };

        let _ = self.cancel_task(user, id).await;
        found
    }

    /// Cancel a running task: fire its trigger, remove it, then tear down its
    /// process group outside the lock. Returns whether a task was found.
    pub async fn cancel_task(&self, user: UserId, id: TaskId) -> bool {
        let teardown = self.state.write().detach_task(user, id);
        match teardown {
            Some(teardown) => {
                self.teardown(teardown).await;
                true
            }
            None => false,
        }
    }

    /// Cancel whatever `(user, id)` currently is and report who owns the
    /// terminal rendering. See [`CancelOutcome`].
    pub async fn cancel(&self, user: UserId, id: TaskId) -> CancelOutcome {
        let (waiting, teardown) = {
            let mut state = self.state.write();
            let item = state.remove_queued(user, id);
            let waiting = item.filter(|item| item.mark_cancelled());
            (waiting, state.detach_task(user, id))
        };

        if let Some(teardown) = teardown {
            self.teardown(teardown).await;
            return CancelOutcome::Running;
        }
        match waiting {
            Some(item) => {
                info!(user, task_id = id, "queued item cancelled before start");
                CancelOutcome::Waiting(item)
            }
            None => CancelOutcome::NotFound,
        }
    }

    /// Cancel every running task (shutdown path).
    pub async fn cancel_all(&self) {
        let teardowns: Vec<Teardown> = {
            let mut state = self.state.write();
            let keys: Vec<(UserId, TaskId)> = state
                .tasks
                .iter()
                .flat_map(|(user, tasks)| tasks.keys().map(move |id| (*user, *id)))
                .collect();
            keys.into_iter()
                .filter_map(|(user, id)| state.detach_task(user, id))
                .collect()
        };
        for teardown in teardowns {
            self.teardown(teardown).await;
        }
    }

    async fn teardown(&self, teardown: Teardown) {
        let Teardown { user, id, process } = teardown;
        match process {
            Some(ids) if ids.pgid != 0 => {
                info!(user, task_id = id, pgid = ids.pgid, "terminating process group");
                self.runner
                    .kill_group(ids.pgid, self.settings.kill_grace)
                    .await;
            }
            Some(ids) => {
                info!(user, task_id = id, pid = ids.pid, "process group unknown; killing by pid");
                self.runner.kill_process_tree(ids.pid);
            }
            None => {
                debug!(user, task_id = id, "cancelled before a process was attached");
            }
        }
    }

    // ---- display cache ---------------------------------------------------

    pub fn init_display(&self, display: DisplayRef, lines: Vec<String>, controls: Option<Controls>) {
        self.state.write().displays.init(display, lines, controls);
    }

    pub fn update_line(
        &self,
        display: DisplayRef,
        index: usize,
        text: String,
    ) -> Option<(Vec<String>, Option<Controls>)> {
        self.state.write().displays.update_line(display, index, text)
    }

    pub fn decrement_pending(&self, display: DisplayRef) -> usize {
        self.state.write().displays.decrement(display)
    }

    pub fn display_lines(&self, display: DisplayRef) -> Option<Vec<String>> {
        self.state.read().displays.lines(display)
    }

    pub fn display_controls(&self, display: DisplayRef) -> Option<Controls> {
        self.state.read().displays.controls(display)
    }

    pub fn pending_count(&self, display: DisplayRef) -> Option<usize> {
        self.state.read().displays.pending(display)
    }

    pub fn release_display(&self, display: DisplayRef) -> bool {
        self.state.write().displays.release(display)
    }

    pub fn cached_displays(&self) -> usize {
        self.state.read().displays.len()
    }
}
