//! Bounded spawn retry.
//!
//! A spawn that fails is retried a fixed number of times with a short fixed
//! pause between attempts. When the budget runs out the caller gets a
//! [`SpawnFailure`] and decides what to give up on; nothing here loops
//! forever.

use std::thread;
use std::time::Duration;

use tracing::warn;

use drover_types::{DroverError, RetryConfig, SlotId};

use crate::launcher::Launcher;

/// Retry budget for a single slot's spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnRetry {
    /// Total attempts, including the first. Never less than one.
    pub attempts: u32,
    /// Pause between consecutive attempts.
    pub backoff: Duration,
}

impl SpawnRetry {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }
}

impl From<&RetryConfig> for SpawnRetry {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.spawn_attempts,
            Duration::from_millis(config.spawn_backoff_ms),
        )
    }
}

/// Every attempt in the budget failed.
#[derive(Debug)]
pub struct SpawnFailure {
    pub attempts: u32,
    pub last_error: DroverError,
}

impl std::fmt::Display for SpawnFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gave up after {} attempt(s): {}",
            self.attempts, self.last_error
        )
    }
}

impl std::error::Error for SpawnFailure {}

/// Spawn a worker for `slot`, retrying per `policy`.
///
/// Blocks for at most `(attempts - 1) * backoff` plus process-creation time.
/// Only pool formation calls this, before the event loop starts; once it
/// runs, retries are scheduled as respawns instead.
pub fn spawn_with_retry<L: Launcher + ?Sized>(
    launcher: &mut L,
    slot: SlotId,
    policy: &SpawnRetry,
) -> Result<u32, SpawnFailure> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match launcher.spawn(slot) {
            Ok(pid) => return Ok(pid),
            Err(e) if attempt >= attempts => {
                return Err(SpawnFailure {
                    attempts: attempt,
                    last_error: e,
                })
            }
            Err(e) => {
                warn!(
                    slot = %slot,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "worker spawn failed, retrying"
                );
                if !policy.backoff.is_zero() {
                    thread::sleep(policy.backoff);
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_types::WorkerSignal;

    /// Fails the first `failures` spawns, then hands out pids from 100.
    struct Flaky {
        failures: u32,
        calls: u32,
    }

    impl Launcher for Flaky {
        fn spawn(&mut self, slot: SlotId) -> Result<u32, DroverError> {
            self.calls += 1;
            if self.calls <= self.failures {
                return Err(DroverError::Spawn {
                    slot,
                    reason: format!("attempt {} refused", self.calls),
                });
            }
            Ok(99 + self.calls)
        }

        fn terminate(&mut self, _: SlotId, _: u32, _: WorkerSignal) -> Result<(), DroverError> {
            Ok(())
        }
    }

    #[test]
    fn succeeds_within_budget() {
        let mut launcher = Flaky { failures: 2, calls: 0 };
        let pid = spawn_with_retry(&mut launcher, SlotId::new(1), &SpawnRetry::new(3, Duration::ZERO))
            .unwrap();
        assert_eq!(pid, 102);
        assert_eq!(launcher.calls, 3);
    }

    #[test]
    fn gives_up_after_budget() {
        let mut launcher = Flaky { failures: 10, calls: 0 };
        let failure =
            spawn_with_retry(&mut launcher, SlotId::new(4), &SpawnRetry::new(3, Duration::ZERO))
                .unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(launcher.calls, 3);
        assert!(failure.to_string().contains("attempt 3 refused"));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let mut launcher = Flaky { failures: 0, calls: 0 };
        let policy = SpawnRetry::new(0, Duration::ZERO);
        assert_eq!(policy.attempts, 1);
        spawn_with_retry(&mut launcher, SlotId::new(1), &policy).unwrap();
        assert_eq!(launcher.calls, 1);
    }

    #[test]
    fn from_config_uses_millis() {
        let config = RetryConfig {
            spawn_attempts: 5,
            spawn_backoff_ms: 250,
        };
        let policy = SpawnRetry::from(&config);
        assert_eq!(policy.attempts, 5);
        assert_eq!(policy.backoff, Duration::from_millis(250));
    }
}
