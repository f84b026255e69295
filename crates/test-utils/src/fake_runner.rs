use std::collections::{HashMap, HashSet};
use std::io;
use std::time::Duration;

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, sleep_until};
use tokio_util::sync::CancellationToken;

use taskrelay::errors::{RelayError, Result};
use taskrelay::exec::{ExitOutcome, ProcessRunner, RunRequest, RunningProcess};
use taskrelay::registry::ProcessIds;
use taskrelay::types::BoxFuture;

/// How a scripted runner ends once its lines are out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeExit {
    Success,
    Failure,
    /// Keep running (silently) until killed or timed out.
    Hang,
}

/// Output of one fake runner: lines with the delay before each, then an exit.
#[derive(Debug, Clone)]
pub struct Script {
    lines: Vec<(Duration, String)>,
    exit: FakeExit,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            lines: Vec::new(),
            exit: FakeExit::Success,
        }
    }
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `text` after waiting `delay_ms`.
    pub fn line(mut self, delay_ms: u64, text: &str) -> Self {
        self.lines.push((Duration::from_millis(delay_ms), text.to_string()));
        self
    }

    pub fn exit(mut self, exit: FakeExit) -> Self {
        self.exit = exit;
        self
    }

    pub fn hang() -> Self {
        Self::new().exit(FakeExit::Hang)
    }
}

/// One recorded `spawn`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRecord {
    pub target: String,
    pub lock_token: String,
    pub ids: ProcessIds,
}

#[derive(Debug, Default)]
struct State {
    scripts: HashMap<String, Script>,
    failing: HashSet<String>,
    spawns: Vec<SpawnRecord>,
    kill_groups: Vec<(i32, Duration)>,
    tree_kills: Vec<u32>,
    /// Kill switches of runners that have not exited yet, by pgid.
    live: HashMap<i32, CancellationToken>,
    max_active: usize,
    next_pid: u32,
}

impl State {
    /// Mark a runner as gone and stop its script. Idempotent.
    fn retire(&mut self, pgid: i32) {
        if let Some(kill) = self.live.remove(&pgid) {
            kill.cancel();
        }
    }
}

/// A [`ProcessRunner`] that plays scripted output instead of spawning
/// processes, and records every spawn and kill.
#[derive(Debug, Clone, Default)]
pub struct FakeRunner {
    state: Arc<Mutex<State>>,
    default_script: Script,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script used for targets without their own.
    pub fn with_default(mut self, script: Script) -> Self {
        self.default_script = script;
        self
    }

    pub fn with_script(self, target: &str, script: Script) -> Self {
        self.state.lock().scripts.insert(target.to_string(), script);
        self
    }

    /// Make `spawn` fail for `target`.
    pub fn with_spawn_failure(self, target: &str) -> Self {
        self.state.lock().failing.insert(target.to_string());
        self
    }

    pub fn spawns(&self) -> Vec<SpawnRecord> {
        self.state.lock().spawns.clone()
    }

    pub fn spawned_targets(&self) -> Vec<String> {
        self.state.lock().spawns.iter().map(|s| s.target.clone()).collect()
    }

    pub fn kill_groups(&self) -> Vec<(i32, Duration)> {
        self.state.lock().kill_groups.clone()
    }

    pub fn tree_kills(&self) -> Vec<u32> {
        self.state.lock().tree_kills.clone()
    }

    /// Runners currently alive.
    pub fn active(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Highest number of runners ever alive at the same time.
    pub fn max_active(&self) -> usize {
        self.state.lock().max_active
    }
}

impl ProcessRunner for FakeRunner {
    fn spawn(&self, request: RunRequest) -> Result<Box<dyn RunningProcess>> {
        let mut state = self.state.lock();
        if state.failing.contains(&request.target) {
            return Err(RelayError::Spawn(format!("scripted failure for {}", request.target)));
        }

        state.next_pid += 1;
        let pid = 1000 + state.next_pid;
        let ids = ProcessIds {
            pid,
            pgid: pid as i32,
        };
        state.spawns.push(SpawnRecord {
            target: request.target.clone(),
            lock_token: request.lock_token.clone(),
            ids,
        });

        let kill = CancellationToken::new();
        state.live.insert(ids.pgid, kill.clone());
        state.max_active = state.max_active.max(state.live.len());

        let script = state
            .scripts
            .get(&request.target)
            .cloned()
            .unwrap_or_else(|| self.default_script.clone());
        drop(state);

        let (line_tx, line_rx) = mpsc::channel(64);
        let (exit_tx, exit_rx) = oneshot::channel();
        let shared = Arc::clone(&self.state);
        let script_kill = kill.clone();
        tokio::spawn(async move {
            let outcome = play(script, line_tx, &script_kill).await;
            shared.lock().retire(ids.pgid);
            let _ = exit_tx.send(outcome);
        });

        Ok(Box::new(FakeProcess {
            ids,
            lines: Some(line_rx),
            exit: Some(exit_rx),
            kill,
            state: Arc::clone(&self.state),
            request,
        }))
    }

    fn kill_group(&self, pgid: i32, grace: Duration) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            {
                let mut state = self.state.lock();
                state.kill_groups.push((pgid, grace));
                state.retire(pgid);
            }
            sleep(grace).await;
        })
    }

    fn kill_process_tree(&self, pid: u32) {
        let mut state = self.state.lock();
        state.tree_kills.push(pid);
        state.retire(pid as i32);
    }
}

async fn play(
    script: Script,
    line_tx: mpsc::Sender<io::Result<String>>,
    kill: &CancellationToken,
) -> ExitOutcome {
    for (delay, text) in script.lines {
        tokio::select! {
            _ = kill.cancelled() => return ExitOutcome::Failed("killed".into()),
            _ = sleep(delay) => {}
        }
        if line_tx.send(Ok(text)).await.is_err() {
            break;
        }
    }
    match script.exit {
        FakeExit::Success => ExitOutcome::Success,
        FakeExit::Failure => ExitOutcome::Failed("exit status 1".into()),
        FakeExit::Hang => {
            kill.cancelled().await;
            ExitOutcome::Failed("killed".into())
        }
    }
}

struct FakeProcess {
    ids: ProcessIds,
    lines: Option<mpsc::Receiver<io::Result<String>>>,
    exit: Option<oneshot::Receiver<ExitOutcome>>,
    kill: CancellationToken,
    state: Arc<Mutex<State>>,
    request: RunRequest,
}

impl FakeProcess {
    fn kill(&self) {
        self.state.lock().retire(self.ids.pgid);
        self.kill.cancel();
    }
}

impl Drop for FakeProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

impl RunningProcess for FakeProcess {
    fn ids(&self) -> Option<ProcessIds> {
        Some(self.ids)
    }

    fn process_group(&mut self) -> Option<i32> {
        Some(self.ids.pgid)
    }

    fn take_lines(&mut self) -> Option<mpsc::Receiver<io::Result<String>>> {
        self.lines.take()
    }

    fn wait(&mut self) -> BoxFuture<'_, ExitOutcome> {
        Box::pin(async move {
            let Some(mut exit) = self.exit.take() else {
                return ExitOutcome::Failed("already waited".into());
            };
            let deadline = self.request.deadline;
            let cancel = self.request.cancel.clone();
            tokio::select! {
                biased;
                outcome = &mut exit => outcome.unwrap_or(ExitOutcome::Failed("runner vanished".into())),
                _ = sleep_until(deadline) => {
                    self.kill();
                    ExitOutcome::TimedOut
                }
                _ = cancel.cancelled() => {
                    self.kill();
                    ExitOutcome::Cancelled
                }
            }
        })
    }
}
