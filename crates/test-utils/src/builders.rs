#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use taskrelay::config::{ConfigFile, RawConfigFile};
use taskrelay::display::{DisplayAggregator, DisplaySurface};
use taskrelay::engine::{ButtonPress, Dispatcher, IncomingMessage, Router, UserInfo};
use taskrelay::exec::{ExecSettings, ProcessRunner, TaskExecutor, spawn_queue_worker};
use taskrelay::registry::{QueueReceiver, RegistrySettings, TaskRegistry};
use taskrelay::types::{ChatId, DisplayRef, QueueFullPolicy, UserId};

use crate::fake_runner::FakeRunner;
use crate::recording_surface::RecordingSurface;

/// Chat every harness message is sent in.
pub const TEST_CHAT: ChatId = 42;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.queue.capacity = capacity;
        self
    }

    pub fn with_when_full(mut self, policy: QueueFullPolicy) -> Self {
        self.config.queue.when_full = policy;
        self
    }

    pub fn with_allowed_users(mut self, users: &[UserId]) -> Self {
        self.config.access.allowed_users = users.to_vec();
        self
    }

    pub fn with_timeout(mut self, timeout: &str) -> Self {
        self.config.runner.timeout = timeout.to_string();
        self
    }

    pub fn with_status_interval(mut self, interval: &str) -> Self {
        self.config.runner.status_interval = interval.to_string();
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the core needs, wired to a [`FakeRunner`] and a
/// [`RecordingSurface`].
pub struct Harness {
    pub config: ConfigFile,
    pub registry: Arc<TaskRegistry>,
    pub runner: Arc<FakeRunner>,
    pub surface: Arc<RecordingSurface>,
    pub display: Arc<DisplayAggregator>,
    pub executor: TaskExecutor,
    pub dispatcher: Arc<Dispatcher>,
    pub shutdown: CancellationToken,
    queue: Option<QueueReceiver>,
    next_message: AtomicI32,
}

impl Harness {
    pub fn new(config: ConfigFile, runner: FakeRunner) -> Self {
        Self::with_warning_ttl(config, runner, Duration::from_secs(5))
    }

    pub fn with_warning_ttl(config: ConfigFile, runner: FakeRunner, warning_ttl: Duration) -> Self {
        let runner = Arc::new(runner);
        let process_runner: Arc<dyn ProcessRunner> = runner.clone();
        let (registry, queue) = TaskRegistry::new(RegistrySettings::from(&config), Arc::clone(&process_runner));

        let surface = Arc::new(RecordingSurface::new());
        let dyn_surface: Arc<dyn DisplaySurface> = surface.clone();
        let display = Arc::new(DisplayAggregator::new(Arc::clone(&registry), dyn_surface));
        let executor = TaskExecutor::new(
            Arc::clone(&registry),
            process_runner,
            Arc::clone(&display),
            ExecSettings::from(&config),
        );
        let dispatcher = Dispatcher::new(Router::from_config(&config), Arc::clone(&registry), Arc::clone(&display))
            .with_warning_ttl(warning_ttl);

        Self {
            config,
            registry,
            runner,
            surface,
            display,
            executor,
            dispatcher: Arc::new(dispatcher),
            shutdown: CancellationToken::new(),
            queue: Some(queue),
            next_message: AtomicI32::new(10_000),
        }
    }

    /// Default config and a runner that exits cleanly without output.
    pub fn default_with(runner: FakeRunner) -> Self {
        Self::new(ConfigFileBuilder::new().build(), runner)
    }

    /// Take the consumer end of the queue (to drive items by hand).
    pub fn take_queue(&mut self) -> QueueReceiver {
        self.queue.take().expect("queue already taken")
    }

    pub fn start_worker(&mut self) -> JoinHandle<()> {
        let queue = self.take_queue();
        spawn_queue_worker(self.executor.clone(), queue, self.shutdown.clone())
    }

    pub fn message(&self, user: UserId, text: &str) -> IncomingMessage {
        IncomingMessage {
            chat: TEST_CHAT,
            message: self.next_message.fetch_add(1, Ordering::SeqCst),
            from: user_info(user),
            text: text.to_string(),
        }
    }

    pub fn press(&self, user: UserId, display: DisplayRef, payload: &str) -> ButtonPress {
        ButtonPress {
            id: format!("press-{}", self.next_message.fetch_add(1, Ordering::SeqCst)),
            from: user_info(user),
            display,
            payload: payload.to_string(),
        }
    }
}

pub fn user_info(user: UserId) -> UserInfo {
    UserInfo {
        id: user,
        first_name: format!("user{user}"),
    }
}
