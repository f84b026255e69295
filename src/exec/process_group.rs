// src/exec/process_group.rs

//! Process-group signalling.
//!
//! Runners are started in their own process group so the runner and every
//! child it spawns can be signalled together. On platforms without process
//! groups these helpers are no-ops and callers fall back to killing the
//! single child handle.

use std::time::Duration;

use tracing::{debug, warn};

/// Resolve the process group of `pid`, if the platform has them.
#[cfg(unix)]
pub fn group_of(pid: u32) -> Option<i32> {
    let pid = i32::try_from(pid).ok()?;
    // SAFETY: getpgid has no memory-safety preconditions.
    let pgid = unsafe { libc::getpgid(pid) };
    (pgid > 0).then_some(pgid)
}

#[cfg(not(unix))]
pub fn group_of(_pid: u32) -> Option<i32> {
    None
}

/// Send `signal` to every process in group `pgid`.
///
/// Groups 0 and 1 are never signalled (`kill(0)` / `kill(-1)` would hit our
/// own group or every process we may signal).
#[cfg(unix)]
pub fn signal_group(pgid: i32, signal: libc::c_int) -> bool {
    if pgid <= 1 {
        warn!(pgid, "refusing to signal reserved process group");
        return false;
    }
    // SAFETY: kill has no memory-safety preconditions.
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc != 0 {
        debug!(pgid, signal, error = %std::io::Error::last_os_error(), "group signal failed");
    }
    rc == 0
}

/// Graceful-then-forceful teardown: SIGTERM, wait `grace`, SIGKILL.
#[cfg(unix)]
pub async fn terminate_group(pgid: i32, grace: Duration) {
    if pgid <= 1 {
        warn!(pgid, "refusing to terminate reserved process group");
        return;
    }
    debug!(pgid, grace_ms = grace.as_millis() as u64, "SIGTERM to process group");
    signal_group(pgid, libc::SIGTERM);
    tokio::time::sleep(grace).await;
    debug!(pgid, "SIGKILL to process group");
    signal_group(pgid, libc::SIGKILL);
}

#[cfg(not(unix))]
pub async fn terminate_group(pgid: i32, _grace: Duration) {
    debug!(pgid, "process groups unsupported on this platform");
}

/// Kill a process whose group was never recorded: try the group led by
/// `pid` first, then the bare process.
#[cfg(unix)]
pub fn kill_process_tree(pid: u32) {
    let Ok(pid) = i32::try_from(pid) else {
        return;
    };
    if pid <= 1 {
        return;
    }
    if signal_group(pid, libc::SIGKILL) {
        return;
    }
    // SAFETY: kill has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pid, error = %std::io::Error::last_os_error(), "process kill failed");
    }
}

#[cfg(not(unix))]
pub fn kill_process_tree(pid: u32) {
    debug!(pid, "process-tree kill unsupported on this platform");
}
