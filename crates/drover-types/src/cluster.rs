//! Worker lifecycle, supervisor commands, and fault types.
//!
//! These are the values that flow through the master's event queue: commands
//! from the signal router, exit notices from the launcher, and the faults the
//! state machine records when a worker misbehaves.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::SlotId;

/// Lifecycle state of a single worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkerState {
    /// Spawned, not yet alive for the running grace interval.
    Starting,
    /// Alive past the grace interval and considered serving.
    Running,
    /// A termination signal was sent; waiting for the exit notice.
    Stopping,
    /// The OS reported termination with this raw exit status.
    Exited { code: i32 },
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Starting => write!(f, "Starting"),
            WorkerState::Running => write!(f, "Running"),
            WorkerState::Stopping => write!(f, "Stopping"),
            WorkerState::Exited { code } => write!(f, "Exited ({code})"),
        }
    }
}

/// The structural operation currently in flight. At most one at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    #[default]
    Idle,
    ScalingUp,
    ScalingDown,
    Reloading,
    /// Terminal: the pool is draining and the master will exit.
    Stopping,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Idle => "idle",
            Operation::ScalingUp => "scaling_up",
            Operation::ScalingDown => "scaling_down",
            Operation::Reloading => "reloading",
            Operation::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Which signal asked for a reload. Both kinds run the same algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadKind {
    Rolling,
    Full,
}

/// A supervisor command, produced by the signal router or the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Grow (positive) or shrink (negative) the desired worker count.
    ScaleBy(i32),
    /// Replace every worker one at a time (graceful-reload signal).
    RollingReload,
    /// Replace every worker one at a time (hang-up-reload signal).
    FullReload,
    /// Drain the pool and exit the master.
    Stop,
}

impl Command {
    /// The reload kind, if this is a reload command.
    pub fn reload_kind(&self) -> Option<ReloadKind> {
        match self {
            Command::RollingReload => Some(ReloadKind::Rolling),
            Command::FullReload => Some(ReloadKind::Full),
            _ => None,
        }
    }
}

/// A signal the launcher can deliver to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerSignal {
    /// SIGTERM to the worker process.
    Terminate,
    /// SIGKILL to the worker's whole process tree.
    Kill,
    /// An arbitrary signal number, delivered to the worker process only.
    Custom(i32),
}

/// Emitted by the launcher's exit observer when a worker process terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitNotice {
    pub slot: SlotId,
    pub pid: u32,
    /// Raw exit status; `128 + signo` when the process was killed by a signal.
    pub code: i32,
}

/// Outcome of draining the pool on stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DrainResult {
    /// Every worker exited within the drain timeout.
    Clean,
    /// These slots had to be force-killed.
    Forced { slots: Vec<SlotId> },
}

impl DrainResult {
    /// Process exit code for the master: 0 when clean, 1 when forced.
    pub fn exit_code(&self) -> i32 {
        match self {
            DrainResult::Clean => 0,
            DrainResult::Forced { .. } => 1,
        }
    }
}

/// A per-worker failure the supervisor handled locally and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fault", rename_all = "snake_case")]
pub enum ClusterFault {
    /// A slot could not be (re)started within the retry budget and was
    /// abandoned; the desired count shrank by one.
    SpawnExhausted {
        slot: SlotId,
        attempts: u32,
        reason: String,
    },
    /// A running worker exited without being asked to.
    UnexpectedExit { slot: SlotId, pid: u32, code: i32 },
    /// A reload replacement never reached `Running`; the incumbent was kept.
    ReloadTimeout { slot: SlotId },
    /// A reload replacement failed to spawn or died while starting; the
    /// incumbent was kept.
    ReplacementFailed { slot: SlotId, reason: String },
    /// Workers that ignored SIGTERM for the whole drain timeout.
    DrainTimeout { slots: Vec<SlotId> },
}

impl fmt::Display for ClusterFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterFault::SpawnExhausted {
                slot,
                attempts,
                reason,
            } => write!(f, "{slot} abandoned after {attempts} attempts: {reason}"),
            ClusterFault::UnexpectedExit { slot, pid, code } => {
                write!(f, "{slot} (pid {pid}) exited unexpectedly with code {code}")
            }
            ClusterFault::ReloadTimeout { slot } => {
                write!(f, "{slot} replacement did not reach running in time")
            }
            ClusterFault::ReplacementFailed { slot, reason } => {
                write!(f, "{slot} replacement failed: {reason}")
            }
            ClusterFault::DrainTimeout { slots } => {
                write!(f, "{} worker(s) force-killed during drain", slots.len())
            }
        }
    }
}
