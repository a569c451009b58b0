//! Shutdown coordinator: tracks the drain of the pool on stop.
//!
//! The coordinator owns no processes. The state machine tells it which pids
//! were signalled, forwards their exit notices, and polls it on every tick.
//! When the drain deadline passes the coordinator hands back the stragglers
//! to be force-killed and remembers their slots for the final report.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use tracing::{error, warn};

use drover_types::{DrainResult, SlotId};

/// How long to wait for exit notices after SIGKILL before giving up on them.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

/// What the state machine should do after a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainPoll {
    /// Still waiting for exits.
    Pending,
    /// The deadline passed; SIGKILL these `(slot, pid)` pairs.
    Overdue(Vec<(SlotId, u32)>),
    /// Every worker is gone (or given up on).
    Done(DrainResult),
}

#[derive(Debug)]
pub struct ShutdownCoordinator {
    deadline: Instant,
    outstanding: BTreeMap<u32, SlotId>,
    forced: BTreeSet<SlotId>,
    killed_at: Option<Instant>,
    result: Option<DrainResult>,
}

impl ShutdownCoordinator {
    /// Start draining the given `(slot, pid)` pairs, all already sent SIGTERM.
    pub fn begin<I>(workers: I, now: Instant, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = (SlotId, u32)>,
    {
        Self {
            deadline: now + timeout,
            outstanding: workers.into_iter().map(|(slot, pid)| (pid, slot)).collect(),
            forced: BTreeSet::new(),
            killed_at: None,
            result: None,
        }
    }

    /// Record an exit. Returns whether the pid was being waited on.
    pub fn on_exit(&mut self, pid: u32) -> bool {
        self.outstanding.remove(&pid).is_some()
    }

    /// Pull the deadline in to `now` (repeated stop request).
    pub fn force_now(&mut self, now: Instant) {
        if now < self.deadline {
            self.deadline = now;
        }
    }

    pub fn result(&self) -> Option<&DrainResult> {
        self.result.as_ref()
    }

    pub fn poll(&mut self, now: Instant) -> DrainPoll {
        if let Some(result) = &self.result {
            return DrainPoll::Done(result.clone());
        }
        if self.outstanding.is_empty() {
            return DrainPoll::Done(self.finish());
        }

        match self.killed_at {
            None if now >= self.deadline => {
                self.killed_at = Some(now);
                let stragglers: Vec<(SlotId, u32)> = self
                    .outstanding
                    .iter()
                    .map(|(&pid, &slot)| (slot, pid))
                    .collect();
                for (slot, _) in &stragglers {
                    self.forced.insert(*slot);
                }
                warn!(
                    remaining = stragglers.len(),
                    "drain timeout reached, force-killing remaining workers"
                );
                DrainPoll::Overdue(stragglers)
            }
            Some(at) if now.saturating_duration_since(at) >= KILL_GRACE => {
                error!(
                    remaining = self.outstanding.len(),
                    "workers did not report exit after SIGKILL, abandoning them"
                );
                self.outstanding.clear();
                DrainPoll::Done(self.finish())
            }
            _ => DrainPoll::Pending,
        }
    }

    fn finish(&mut self) -> DrainResult {
        let result = if self.forced.is_empty() {
            DrainResult::Clean
        } else {
            DrainResult::Forced {
                slots: self.forced.iter().copied().collect(),
            }
        };
        self.result = Some(result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(n: u64) -> Vec<(SlotId, u32)> {
        (1..=n).map(|i| (SlotId::new(i), 100 + i as u32)).collect()
    }

    #[test]
    fn clean_drain() {
        let t0 = Instant::now();
        let mut coord = ShutdownCoordinator::begin(pairs(2), t0, Duration::from_secs(30));
        assert_eq!(coord.poll(t0), DrainPoll::Pending);

        assert!(coord.on_exit(101));
        assert!(!coord.on_exit(101));
        assert_eq!(coord.outstanding.len(), 1);
        assert!(coord.on_exit(102));

        assert_eq!(coord.poll(t0), DrainPoll::Done(DrainResult::Clean));
        assert_eq!(coord.result(), Some(&DrainResult::Clean));
    }

    #[test]
    fn empty_pool_drains_immediately() {
        let t0 = Instant::now();
        let mut coord = ShutdownCoordinator::begin(Vec::new(), t0, Duration::from_secs(30));
        assert_eq!(coord.poll(t0), DrainPoll::Done(DrainResult::Clean));
    }

    #[test]
    fn timeout_reports_stragglers_once() {
        let t0 = Instant::now();
        let timeout = Duration::from_secs(30);
        let mut coord = ShutdownCoordinator::begin(pairs(3), t0, timeout);
        coord.on_exit(101);

        let overdue = coord.poll(t0 + timeout);
        assert_eq!(
            overdue,
            DrainPoll::Overdue(vec![(SlotId::new(2), 102), (SlotId::new(3), 103)])
        );
        assert_eq!(coord.poll(t0 + timeout), DrainPoll::Pending);

        coord.on_exit(102);
        coord.on_exit(103);
        assert_eq!(
            coord.poll(t0 + timeout),
            DrainPoll::Done(DrainResult::Forced {
                slots: vec![SlotId::new(2), SlotId::new(3)]
            })
        );
    }

    #[test]
    fn force_now_pulls_deadline_in() {
        let t0 = Instant::now();
        let mut coord = ShutdownCoordinator::begin(pairs(1), t0, Duration::from_secs(30));
        let later = t0 + Duration::from_secs(1);
        coord.force_now(later);
        assert_eq!(coord.deadline, later);
        assert!(matches!(coord.poll(later), DrainPoll::Overdue(_)));
    }

    #[test]
    fn unreported_kills_are_abandoned_after_grace() {
        let t0 = Instant::now();
        let mut coord = ShutdownCoordinator::begin(pairs(1), t0, Duration::ZERO);
        assert!(matches!(coord.poll(t0), DrainPoll::Overdue(_)));
        assert_eq!(coord.poll(t0 + Duration::from_secs(1)), DrainPoll::Pending);

        let done = coord.poll(t0 + KILL_GRACE);
        assert_eq!(
            done,
            DrainPoll::Done(DrainResult::Forced {
                slots: vec![SlotId::new(1)]
            })
        );
        assert!(coord.outstanding.is_empty());
    }
}
