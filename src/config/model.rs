// src/config/model.rs

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::types::{QueueFullPolicy, UserId};

/// Links the submission handler treats as work targets.
pub const DEFAULT_TARGET_PATTERN: &str = r"(?i)(?:https?://)?t\.me/[^\s]+";

/// Links that are offered to the subscription service when no target matched.
pub const DEFAULT_LINK_PATTERN: &str = r"https?://[^\s]+";

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [runner]
/// script = "tdl.sh"
/// timeout = "5m"
///
/// [queue]
/// capacity = 100
/// when_full = "reject"
///
/// [access]
/// allowed_users = [123456789]
/// ```
///
/// All sections are optional and have reasonable defaults. The raw model is
/// turned into a [`ConfigFile`] by `TryFrom`, which validates it.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub runner: RawRunnerSection,

    #[serde(default)]
    pub queue: QueueSection,

    #[serde(default)]
    pub access: AccessSection,

    #[serde(default)]
    pub targets: RawTargetsSection,

    /// `[subscription]`; absent means subscription links are refused.
    #[serde(default)]
    pub subscription: Option<RawSubscriptionSection>,
}

/// `[runner]` section: how the external runner script is invoked.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRunnerSection {
    /// Path to the runner script. Resolved against CLI / env / exe dir when
    /// absent.
    #[serde(default)]
    pub script: Option<String>,

    /// Program used to execute the script.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Absolute per-task deadline.
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Wait between the graceful and the forced signal when cancelling.
    #[serde(default = "default_kill_grace")]
    pub kill_grace: String,

    /// Same, for the sweep of the process group after the runner exited.
    #[serde(default = "default_cleanup_grace")]
    pub cleanup_grace: String,

    /// Minimum spacing between two progress pushes for one task.
    #[serde(default = "default_status_interval")]
    pub status_interval: String,
}

fn default_interpreter() -> String {
    "bash".to_string()
}

fn default_timeout() -> String {
    "5m".to_string()
}

fn default_kill_grace() -> String {
    "500ms".to_string()
}

fn default_cleanup_grace() -> String {
    "800ms".to_string()
}

fn default_status_interval() -> String {
    "1s".to_string()
}

impl Default for RawRunnerSection {
    fn default() -> Self {
        Self {
            script: None,
            interpreter: default_interpreter(),
            timeout: default_timeout(),
            kill_grace: default_kill_grace(),
            cleanup_grace: default_cleanup_grace(),
            status_interval: default_status_interval(),
        }
    }
}

/// `[queue]` section.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QueueSection {
    /// Maximum number of items waiting in the pending FIFO.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// `"reject"` (default) or `"block"`.
    #[serde(default)]
    pub when_full: QueueFullPolicy,
}

fn default_capacity() -> usize {
    100
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            when_full: QueueFullPolicy::default(),
        }
    }
}

/// `[access]` section. An empty or missing list means everyone is allowed.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AccessSection {
    #[serde(default)]
    pub allowed_users: Vec<UserId>,
}

impl AccessSection {
    pub fn is_allowed(&self, user: UserId) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user)
    }
}

/// `[targets]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTargetsSection {
    #[serde(default = "default_target_pattern")]
    pub pattern: String,

    /// Subscription links; matches on the target host are never forwarded.
    #[serde(default = "default_link_pattern")]
    pub link_pattern: String,
}

fn default_target_pattern() -> String {
    DEFAULT_TARGET_PATTERN.to_string()
}

fn default_link_pattern() -> String {
    DEFAULT_LINK_PATTERN.to_string()
}

impl Default for RawTargetsSection {
    fn default() -> Self {
        Self {
            pattern: default_target_pattern(),
            link_pattern: default_link_pattern(),
        }
    }
}

/// `[subscription]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSubscriptionSection {
    pub endpoint: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_subscription_timeout")]
    pub timeout: String,
}

fn default_subscription_timeout() -> String {
    "10s".to_string()
}

/// Validated runner settings with parsed durations.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub script: Option<PathBuf>,
    pub interpreter: String,
    pub timeout: Duration,
    pub kill_grace: Duration,
    pub cleanup_grace: Duration,
    pub status_interval: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            script: None,
            interpreter: default_interpreter(),
            timeout: Duration::from_secs(5 * 60),
            kill_grace: Duration::from_millis(500),
            cleanup_grace: Duration::from_millis(800),
            status_interval: Duration::from_secs(1),
        }
    }
}

/// Validated subscription settings.
#[derive(Debug, Clone)]
pub struct SubscriptionSettings {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// Validated configuration used by the rest of the application.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub runner: RunnerSettings,
    pub queue: QueueSection,
    pub access: AccessSection,
    pub target_pattern: Regex,
    pub link_pattern: Regex,
    pub subscription: Option<SubscriptionSettings>,
}

impl ConfigFile {
    /// Distinct user ids on the allow-list (for startup logging).
    pub fn allowed_user_count(&self) -> usize {
        self.access
            .allowed_users
            .iter()
            .collect::<HashSet<_>>()
            .len()
    }
}
