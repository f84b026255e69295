// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Environment variable that overrides the configured runner script.
pub const RUNNER_ENV_VAR: &str = "TASKRELAY_RUNNER";

/// File name looked up next to the executable / in the working directory when
/// no runner script is configured.
pub const DEFAULT_RUNNER_NAME: &str = "tdl.sh";

/// Load a configuration file from a given path and return the raw model.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// A missing file at the *default* location is not an error: every section
/// has defaults, so the service can run without a config file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw = if !path.exists() && path == default_config_path() {
        RawConfigFile::default()
    } else {
        load_from_path(path)?
    };
    let config = ConfigFile::try_from(raw)?;
    Ok(config)
}

/// Default config location: `TaskRelay.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("TaskRelay.toml")
}

/// Decide which runner script to execute.
///
/// Priority:
/// 1. explicit CLI value
/// 2. `TASKRELAY_RUNNER` environment variable
/// 3. `[runner].script` from the config file
/// 4. `tdl.sh` next to the executable (skipped for cargo build dirs)
/// 5. `tdl.sh` in the working directory
pub fn resolve_runner_script(cli: Option<&Path>, configured: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Some(path) = std::env::var_os(RUNNER_ENV_VAR).filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }
    if let Some(path) = configured {
        return path.to_path_buf();
    }

    let cwd_candidate = std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(DEFAULT_RUNNER_NAME);

    let exe_candidate = std::env::current_exe()
        .and_then(fs::canonicalize)
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_RUNNER_NAME)))
        .filter(|candidate| !is_build_dir(candidate));

    match exe_candidate {
        Some(candidate) if candidate.exists() || !cwd_candidate.exists() => candidate,
        _ => cwd_candidate,
    }
}

fn is_build_dir(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str() == "target" || c.as_os_str() == "deps")
}
