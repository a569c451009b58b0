//! Worker handle: the master's record of one worker process.
//!
//! A handle binds a slot to the OS pid currently serving it. Everything the
//! state machine decides about a worker (is it serving yet, did it crash
//! while starting, has it ignored SIGTERM for too long) is read off the
//! handle's state and timestamps.

use std::time::{Duration, Instant};

use drover_types::{SlotId, WorkerState};

/// Bookkeeping carried from one process of a slot to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lineage {
    /// Generation of the previous process in this slot (0 before the first).
    pub generation: u32,
    /// Consecutive starts that died before reaching `Running`.
    pub start_failures: u32,
    /// Consecutive crashes within the flap window.
    pub quick_crashes: u32,
}

/// Runtime state for a single worker process.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    pub slot: SlotId,
    /// Reassigned on every (re)spawn of the slot.
    pub pid: u32,
    pub state: WorkerState,
    /// When this process was spawned.
    pub started_at: Instant,
    /// How many processes this slot has had, this one included.
    pub generation: u32,
    pub start_failures: u32,
    pub quick_crashes: u32,
    /// Set when SIGTERM was sent.
    pub stop_requested_at: Option<Instant>,
    /// Set once the process tree was sent SIGKILL.
    pub force_killed: bool,
}

impl WorkerHandle {
    /// A freshly spawned worker in `Starting`.
    pub fn spawned(slot: SlotId, pid: u32, lineage: Lineage, now: Instant) -> Self {
        Self {
            slot,
            pid,
            state: WorkerState::Starting,
            started_at: now,
            generation: lineage.generation + 1,
            start_failures: lineage.start_failures,
            quick_crashes: lineage.quick_crashes,
            stop_requested_at: None,
            force_killed: false,
        }
    }

    /// Bookkeeping to hand to the next process in this slot.
    pub fn lineage(&self) -> Lineage {
        Lineage {
            generation: self.generation,
            start_failures: self.start_failures,
            quick_crashes: self.quick_crashes,
        }
    }

    pub fn uptime(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub fn is_running(&self) -> bool {
        self.state == WorkerState::Running
    }

    pub fn is_starting(&self) -> bool {
        self.state == WorkerState::Starting
    }

    pub fn is_stopping(&self) -> bool {
        self.state == WorkerState::Stopping
    }

    /// Move `Starting` to `Running` once alive for `grace`.
    ///
    /// Returns whether the promotion happened on this call.
    pub fn promote_if_ready(&mut self, now: Instant, grace: Duration) -> bool {
        if self.is_starting() && self.uptime(now) >= grace {
            self.state = WorkerState::Running;
            self.start_failures = 0;
            return true;
        }
        false
    }

    pub fn mark_stopping(&mut self, now: Instant) {
        self.state = WorkerState::Stopping;
        self.stop_requested_at.get_or_insert(now);
    }

    /// A stopping worker that has not exited within `timeout` of SIGTERM.
    pub fn stop_overdue(&self, now: Instant, timeout: Duration) -> bool {
        !self.force_killed
            && self
                .stop_requested_at
                .is_some_and(|at| now.saturating_duration_since(at) >= timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_spawn_is_generation_one() {
        let now = Instant::now();
        let handle = WorkerHandle::spawned(SlotId::new(1), 100, Lineage::default(), now);
        assert_eq!(handle.generation, 1);
        assert!(handle.is_starting());

        let next = WorkerHandle::spawned(SlotId::new(1), 101, handle.lineage(), now);
        assert_eq!(next.generation, 2);
    }

    #[test]
    fn promotion_waits_for_grace() {
        let t0 = Instant::now();
        let grace = Duration::from_millis(500);
        let mut handle = WorkerHandle::spawned(
            SlotId::new(1),
            100,
            Lineage {
                generation: 0,
                start_failures: 2,
                quick_crashes: 0,
            },
            t0,
        );

        assert!(!handle.promote_if_ready(t0 + Duration::from_millis(100), grace));
        assert!(handle.is_starting());

        assert!(handle.promote_if_ready(t0 + grace, grace));
        assert!(handle.is_running());
        assert_eq!(handle.start_failures, 0);

        // Already running: no second promotion.
        assert!(!handle.promote_if_ready(t0 + grace * 2, grace));
    }

    #[test]
    fn stop_escalation_deadline() {
        let t0 = Instant::now();
        let timeout = Duration::from_secs(10);
        let mut handle = WorkerHandle::spawned(SlotId::new(3), 7, Lineage::default(), t0);
        assert!(!handle.stop_overdue(t0 + timeout * 5, timeout));

        handle.mark_stopping(t0);
        assert!(handle.is_stopping());
        assert!(!handle.stop_overdue(t0 + Duration::from_secs(9), timeout));
        assert!(handle.stop_overdue(t0 + timeout, timeout));

        // A second stop request keeps the original deadline.
        handle.mark_stopping(t0 + Duration::from_secs(5));
        assert_eq!(handle.stop_requested_at, Some(t0));

        handle.force_killed = true;
        assert!(!handle.stop_overdue(t0 + timeout, timeout));
    }
}
