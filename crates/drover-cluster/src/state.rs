//! Status snapshot written to `state.json` for `drover status`.
//!
//! The master rewrites the snapshot after every event it handles (and
//! periodically while idle). Writes go to a temporary file that is renamed
//! over the real one, so readers never see a half-written snapshot.

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use drover_launcher::Launcher;
use drover_types::{ClusterFault, DroverError, Operation, ReloadKind, SlotId, WorkerState};

use crate::handle::WorkerHandle;
use crate::machine::Cluster;

/// Point-in-time view of the master and its pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub master_pid: u32,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub desired: usize,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reload: Option<ReloadKind>,
    /// Slot owners, then the reload replacement, then retiring workers.
    pub workers: Vec<WorkerSnapshot>,
    #[serde(default)]
    pub pending_respawns: usize,
    #[serde(default)]
    pub queued_commands: usize,
    #[serde(default)]
    pub faults: Vec<ClusterFault>,
}

/// What a worker is doing relative to its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    /// Owns its slot.
    Active,
    /// Reload replacement, not yet swapped in.
    Replacement,
    /// Replaced or abandoned; waiting to exit.
    Retiring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub slot: SlotId,
    pub pid: u32,
    #[serde(flatten)]
    pub state: WorkerState,
    pub role: WorkerRole,
    pub generation: u32,
    pub uptime_secs: u64,
}

impl WorkerSnapshot {
    fn of(handle: &WorkerHandle, role: WorkerRole, now: Instant) -> Self {
        Self {
            slot: handle.slot,
            pid: handle.pid,
            state: handle.state,
            role,
            generation: handle.generation,
            uptime_secs: handle.uptime(now).as_secs(),
        }
    }
}

impl ClusterSnapshot {
    /// Capture the current state of `cluster`.
    pub fn capture<L: Launcher>(
        cluster: &Cluster<L>,
        master_pid: u32,
        started_at: DateTime<Utc>,
        now: Instant,
    ) -> Self {
        let mut workers: Vec<WorkerSnapshot> = cluster
            .workers()
            .map(|w| WorkerSnapshot::of(w, WorkerRole::Active, now))
            .collect();
        workers.extend(
            cluster
                .incoming()
                .map(|w| WorkerSnapshot::of(w, WorkerRole::Replacement, now)),
        );
        workers.extend(
            cluster
                .retiring()
                .map(|w| WorkerSnapshot::of(w, WorkerRole::Retiring, now)),
        );

        Self {
            master_pid,
            started_at,
            updated_at: Utc::now(),
            desired: cluster.desired(),
            operation: cluster.operation(),
            reload: cluster.reload_kind(),
            workers,
            pending_respawns: cluster.pending_respawns(),
            queued_commands: cluster.queued_commands(),
            faults: cluster.faults().cloned().collect(),
        }
    }

    /// Workers that currently own a slot and are serving.
    pub fn running(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.role == WorkerRole::Active && w.state == WorkerState::Running)
            .count()
    }

    /// Save to `path` atomically (write tmp, then rename).
    pub fn save(&self, path: &Path) -> Result<(), DroverError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DroverError::State(format!("failed to create state dir: {e}")))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| DroverError::State(format!("failed to serialize state: {e}")))?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json)
            .map_err(|e| DroverError::State(format!("failed to write state tmp: {e}")))?;
        std::fs::rename(&tmp_path, path)
            .map_err(|e| DroverError::State(format!("failed to rename state file: {e}")))?;

        Ok(())
    }

    /// Load from `path`, returning `None` if it doesn't exist or is unreadable.
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to parse state snapshot");
                None
            }
        }
    }

    pub fn remove(path: &Path) {
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClusterSnapshot {
        ClusterSnapshot {
            master_pid: 42,
            started_at: Utc::now(),
            updated_at: Utc::now(),
            desired: 2,
            operation: Operation::Reloading,
            reload: Some(ReloadKind::Rolling),
            workers: vec![
                WorkerSnapshot {
                    slot: SlotId::new(1),
                    pid: 1001,
                    state: WorkerState::Running,
                    role: WorkerRole::Active,
                    generation: 2,
                    uptime_secs: 30,
                },
                WorkerSnapshot {
                    slot: SlotId::new(2),
                    pid: 1002,
                    state: WorkerState::Starting,
                    role: WorkerRole::Replacement,
                    generation: 2,
                    uptime_secs: 0,
                },
                WorkerSnapshot {
                    slot: SlotId::new(1),
                    pid: 900,
                    state: WorkerState::Stopping,
                    role: WorkerRole::Retiring,
                    generation: 1,
                    uptime_secs: 600,
                },
            ],
            pending_respawns: 0,
            queued_commands: 1,
            faults: vec![ClusterFault::ReloadTimeout {
                slot: SlotId::new(3),
            }],
        }
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run").join("state.json");

        sample().save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = ClusterSnapshot::load(&path).unwrap();
        assert_eq!(loaded.master_pid, 42);
        assert_eq!(loaded.operation, Operation::Reloading);
        assert_eq!(loaded.reload, Some(ReloadKind::Rolling));
        assert_eq!(loaded.workers.len(), 3);
        assert_eq!(loaded.workers[2].role, WorkerRole::Retiring);
        assert_eq!(loaded.running(), 1);
        assert_eq!(loaded.faults.len(), 1);
    }

    #[test]
    fn worker_state_is_flattened() {
        let json = serde_json::to_value(&sample().workers[0]).unwrap();
        assert_eq!(json["state"], "running");
        assert_eq!(json["slot"], 1);
    }

    #[test]
    fn load_nonexistent_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ClusterSnapshot::load(&tmp.path().join("missing.json")).is_none());
    }

    #[test]
    fn load_corrupt_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(ClusterSnapshot::load(&path).is_none());
    }
}
