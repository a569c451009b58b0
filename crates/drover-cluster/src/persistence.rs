//! Master PID file: single-instance enforcement and the control handle the
//! CLI uses to find the master it should signal.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use drover_types::DroverError;

/// Claim the PID file for this process.
///
/// Fails if another live master already owns it. A file left behind by a
/// master that no longer exists is replaced.
pub fn claim_pid_file(path: &Path) -> Result<(), DroverError> {
    if let Some(pid) = read_pid(path) {
        if pid != std::process::id() && is_process_alive(pid) {
            return Err(DroverError::PidFile(format!(
                "a master is already running with PID {pid} ({})",
                path.display()
            )));
        }
        warn!(pid, path = %path.display(), "removing stale PID file");
    }
    write_pid_file(path)
}

/// Write this process's PID, creating the run directory if needed.
pub fn write_pid_file(path: &Path) -> Result<(), DroverError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            DroverError::PidFile(format!("failed to create {}: {e}", parent.display()))
        })?;
    }

    let pid = std::process::id();
    fs::write(path, pid.to_string())
        .map_err(|e| DroverError::PidFile(format!("failed to write {}: {e}", path.display())))?;

    info!(pid, path = %path.display(), "master PID file written");
    Ok(())
}

/// Read the PID stored in `path`, if any.
pub fn read_pid(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse().ok()
}

/// The PID of a live master owning `path`.
pub fn live_master(path: &Path) -> Option<u32> {
    read_pid(path).filter(|&pid| is_process_alive(pid))
}

pub fn remove_pid_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        debug!(error = %e, path = %path.display(), "failed to remove PID file (may not exist)");
    }
}

/// Check whether a process with the given PID is alive.
pub fn is_process_alive(pid: u32) -> bool {
    // A PID that wraps negative would address a process group.
    let Ok(raw_pid) = i32::try_from(pid) else {
        return false;
    };
    if raw_pid == 0 {
        return false;
    }
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(raw_pid), None).is_ok()
}
