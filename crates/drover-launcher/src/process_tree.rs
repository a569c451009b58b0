//! Leaf-first signalling of a worker's process tree.
//!
//! A worker is often a wrapper (a shell, a language runtime launcher) with
//! the real server underneath it. Force-killing only the root would orphan
//! the server, so forced termination walks the tree from the root pid and
//! signals every descendant before the root itself.
//!
//! # Security
//!
//! - Refuses to target PID 0 or PID 1.
//! - Only signals processes owned by the master's UID.
//! - Treats ESRCH (already dead) and EPERM (not ours) as skips.

use std::collections::{HashMap, VecDeque};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use drover_types::DroverError;

/// One row of the process table.
#[derive(Debug, Clone)]
struct ProcessInfo {
    pid: i32,
    ppid: i32,
    uid: u32,
}

/// PIDs that must never be signalled.
const PROTECTED_PIDS: [i32; 2] = [0, 1];

fn is_protected(pid: i32) -> bool {
    PROTECTED_PIDS.contains(&pid)
}

fn validate_pid(pid: i32) -> Result<(), DroverError> {
    if is_protected(pid) {
        return Err(DroverError::Signal(format!(
            "refusing to signal protected PID {pid}"
        )));
    }
    if pid < 0 {
        return Err(DroverError::Signal(format!("invalid negative PID {pid}")));
    }
    Ok(())
}

fn current_uid() -> u32 {
    // Safety: getuid() is always safe and cannot fail.
    unsafe { libc::getuid() }
}

/// Enumerate all processes on macOS using libproc.
#[cfg(target_os = "macos")]
fn enumerate_processes() -> Result<Vec<ProcessInfo>, DroverError> {
    use std::mem;

    // PROC_ALL_PIDS from <sys/proc_info.h>.
    const PROC_ALL_PIDS: u32 = 1;

    let num_bytes = unsafe { libc::proc_listpids(PROC_ALL_PIDS, 0, std::ptr::null_mut(), 0) };
    if num_bytes <= 0 {
        return Err(DroverError::Signal(format!(
            "proc_listpids size query failed: {}",
            std::io::Error::last_os_error()
        )));
    }

    // Headroom for processes created between the two calls.
    let pid_count = (num_bytes as usize / mem::size_of::<libc::pid_t>()) + 64;
    let mut pids: Vec<libc::pid_t> = vec![0; pid_count];
    let buf_size = (pid_count * mem::size_of::<libc::pid_t>()) as libc::c_int;

    let actual_bytes =
        unsafe { libc::proc_listpids(PROC_ALL_PIDS, 0, pids.as_mut_ptr().cast(), buf_size) };
    if actual_bytes <= 0 {
        return Err(DroverError::Signal(format!(
            "proc_listpids data query failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    pids.truncate(actual_bytes as usize / mem::size_of::<libc::pid_t>());

    let bsdinfo_size = mem::size_of::<libc::proc_bsdinfo>() as libc::c_int;
    let mut processes = Vec::with_capacity(pids.len());
    for &pid in &pids {
        if pid <= 0 {
            continue;
        }
        let mut info: libc::proc_bsdinfo = unsafe { mem::zeroed() };
        let ret = unsafe {
            libc::proc_pidinfo(
                pid,
                libc::PROC_PIDTBSDINFO,
                0,
                (&raw mut info).cast(),
                bsdinfo_size,
            )
        };
        if ret <= 0 {
            continue;
        }
        processes.push(ProcessInfo {
            pid,
            ppid: info.pbi_ppid as i32,
            uid: info.pbi_uid,
        });
    }

    Ok(processes)
}

/// Enumerate all processes on Linux by reading /proc.
#[cfg(target_os = "linux")]
fn enumerate_processes() -> Result<Vec<ProcessInfo>, DroverError> {
    use std::fs;

    let entries = fs::read_dir("/proc")
        .map_err(|e| DroverError::Signal(format!("cannot read /proc: {e}")))?;

    let mut processes = Vec::new();
    for entry in entries.flatten() {
        let Ok(pid) = entry.file_name().to_string_lossy().parse::<i32>() else {
            continue;
        };
        // The process may exit between read_dir and this read.
        let Ok(status) = fs::read_to_string(format!("/proc/{pid}/status")) else {
            continue;
        };

        let mut ppid = 0;
        let mut uid = u32::MAX;
        for line in status.lines() {
            if let Some(val) = line.strip_prefix("PPid:\t") {
                ppid = val.trim().parse().unwrap_or(0);
            } else if let Some(val) = line.strip_prefix("Uid:\t") {
                // real, effective, saved, filesystem: take the real UID.
                uid = val
                    .split_whitespace()
                    .next()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(u32::MAX);
            }
        }
        processes.push(ProcessInfo { pid, ppid, uid });
    }

    Ok(processes)
}

/// All descendants of `root_pid`, deepest first.
fn find_descendants(root_pid: i32, processes: &[ProcessInfo]) -> Vec<i32> {
    let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
    for p in processes {
        children.entry(p.ppid).or_default().push(p.pid);
    }

    let mut found = Vec::new();
    let mut queue = VecDeque::from([root_pid]);
    while let Some(pid) = queue.pop_front() {
        for &child in children.get(&pid).into_iter().flatten() {
            if child == root_pid {
                continue;
            }
            found.push(child);
            queue.push_back(child);
        }
    }

    // BFS yields parents before children.
    found.reverse();
    found
}

fn owned_by(pid: i32, uid: u32, processes: &[ProcessInfo]) -> bool {
    processes.iter().any(|p| p.pid == pid && p.uid == uid)
}

/// Send one signal. `Ok(false)` means the target was gone or not ours.
fn send_signal(pid: i32, sig: Signal) -> Result<bool, DroverError> {
    match signal::kill(Pid::from_raw(pid), sig) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => {
            debug!(pid, signal = ?sig, "process already dead (ESRCH)");
            Ok(false)
        }
        Err(nix::errno::Errno::EPERM) => {
            warn!(pid, signal = ?sig, "permission denied (EPERM), skipping");
            Ok(false)
        }
        Err(e) => Err(DroverError::Signal(format!(
            "failed to send {sig:?} to PID {pid}: {e}"
        ))),
    }
}

/// Whether a process with this pid exists (zombies included).
pub fn is_alive(pid: i32) -> bool {
    signal::kill(Pid::from_raw(pid), None).is_ok()
}

/// Signal every process in the tree rooted at `root_pid`, leaves first.
///
/// Returns how many processes were signalled. A root that has already
/// exited is not an error and yields `Ok(0)`.
pub fn signal_tree(root_pid: i32, sig: Signal) -> Result<usize, DroverError> {
    validate_pid(root_pid)?;

    let processes = enumerate_processes()?;
    let uid = current_uid();

    if !owned_by(root_pid, uid, &processes) {
        if !is_alive(root_pid) {
            debug!(root_pid, "root process already exited");
            return Ok(0);
        }
        return Err(DroverError::Signal(format!(
            "root PID {root_pid} is not owned by current user (UID {uid})"
        )));
    }

    let mut targets: Vec<i32> = find_descendants(root_pid, &processes)
        .into_iter()
        .filter(|&pid| {
            if is_protected(pid) || !owned_by(pid, uid, &processes) {
                warn!(pid, "skipping process outside our ownership in worker tree");
                return false;
            }
            true
        })
        .collect();
    targets.push(root_pid);

    info!(
        root_pid,
        count = targets.len(),
        signal = ?sig,
        "signalling worker process tree"
    );

    let mut signalled = 0;
    for pid in targets {
        if send_signal(pid, sig)? {
            signalled += 1;
        }
    }
    Ok(signalled)
}
