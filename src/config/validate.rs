// src/config/validate.rs

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use crate::config::duration::parse_duration;
use crate::config::model::{
    ConfigFile, RawConfigFile, RawRunnerSection, RawSubscriptionSection, RunnerSettings,
    SubscriptionSettings,
};
use crate::errors::{RelayError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::RelayError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_queue(&raw)?;
        let runner = validate_runner(&raw.runner)?;
        let target_pattern = validate_pattern("pattern", &raw.targets.pattern)?;
        let link_pattern = validate_pattern("link_pattern", &raw.targets.link_pattern)?;
        let subscription = raw
            .subscription
            .as_ref()
            .map(validate_subscription)
            .transpose()?;

        Ok(ConfigFile {
            runner,
            queue: raw.queue,
            access: raw.access,
            target_pattern,
            link_pattern,
            subscription,
        })
    }
}

fn validate_queue(cfg: &RawConfigFile) -> Result<()> {
    if cfg.queue.capacity == 0 {
        return Err(RelayError::ConfigError(
            "[queue].capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_runner(raw: &RawRunnerSection) -> Result<RunnerSettings> {
    if raw.interpreter.trim().is_empty() {
        return Err(RelayError::ConfigError(
            "[runner].interpreter must not be empty".to_string(),
        ));
    }

    let timeout = duration_field("runner", "timeout", &raw.timeout)?;
    if timeout.is_zero() {
        return Err(RelayError::ConfigError(
            "[runner].timeout must be greater than zero".to_string(),
        ));
    }

    Ok(RunnerSettings {
        script: raw
            .script
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from),
        interpreter: raw.interpreter.trim().to_string(),
        timeout,
        kill_grace: duration_field("runner", "kill_grace", &raw.kill_grace)?,
        cleanup_grace: duration_field("runner", "cleanup_grace", &raw.cleanup_grace)?,
        status_interval: duration_field("runner", "status_interval", &raw.status_interval)?,
    })
}

fn validate_pattern(field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        RelayError::ConfigError(format!("[targets].{field} is not a valid regex: {e}"))
    })
}

fn validate_subscription(raw: &RawSubscriptionSection) -> Result<SubscriptionSettings> {
    let endpoint = raw.endpoint.trim();
    if endpoint.is_empty() {
        return Err(RelayError::ConfigError(
            "[subscription].endpoint must not be empty".to_string(),
        ));
    }
    Ok(SubscriptionSettings {
        endpoint: endpoint.to_string(),
        api_key: raw.api_key.clone(),
        timeout: duration_field("subscription", "timeout", &raw.timeout)?,
    })
}

fn duration_field(section: &str, field: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| {
        RelayError::ConfigError(format!("[{section}].{field} = {value:?}: {e}"))
    })
}
