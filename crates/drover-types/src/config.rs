//! Cluster configuration, loaded from `drover.toml`.
//!
//! Every section and field has a default so a minimal file only needs the
//! worker command. CLI flags are applied on top of the parsed file and the
//! result is checked with [`ClusterConfig::validate`] before the master starts.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DroverError;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "drover.toml";

/// Name of the master PID file inside the run directory.
pub const PID_FILENAME: &str = "master.pid";

/// Name of the status snapshot inside the run directory.
pub const STATE_FILENAME: &str = "state.json";

/// Top-level cluster configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterConfig {
    /// How to launch a worker.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Pool size and its bounds.
    #[serde(default)]
    pub scale: ScaleConfig,
    /// Grace intervals and timeouts.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Spawn retry budget.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Where the master keeps its PID file and status snapshot.
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Where worker stdout/stderr goes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Workers write straight to the master's stdout/stderr.
    #[default]
    Inherit,
    /// Output is captured line by line and re-emitted as log events.
    Log,
}

/// Command template shared by every worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// Program followed by its arguments.
    #[serde(default)]
    pub command: Vec<String>,
    /// Working directory for workers (defaults to the master's).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub output: OutputMode,
    /// Extra environment layered over the master's inherited environment.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl WorkerConfig {
    /// The program to execute, if a command is configured.
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    /// Arguments following the program.
    pub fn args(&self) -> &[String] {
        self.command.get(1..).unwrap_or(&[])
    }
}

/// Pool size settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScaleConfig {
    /// Initial desired worker count.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Scale-down never goes below this.
    #[serde(default)]
    pub min_workers: usize,
    /// Scale-up never goes above this (unbounded when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            min_workers: 0,
            max_workers: None,
        }
    }
}

impl ScaleConfig {
    /// Clamp a requested desired count into `[min_workers, max_workers]`.
    pub fn clamp(&self, requested: i64) -> usize {
        let floor = self.min_workers as i64;
        let mut value = requested.max(floor);
        if let Some(max) = self.max_workers {
            value = value.min(max as i64);
        }
        usize::try_from(value.max(0)).unwrap_or(0)
    }
}

/// Grace intervals and timeouts used by the state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimingConfig {
    /// A worker alive this long without exiting is considered running.
    #[serde(default = "default_running_grace_ms")]
    pub running_grace_ms: u64,
    /// Upper bound for a reload replacement to reach running.
    #[serde(default = "default_reload_timeout_secs")]
    pub reload_timeout_secs: u64,
    /// SIGTERM to SIGKILL escalation for a single stopping worker.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    /// How long a stop waits for the whole pool before force-killing.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
    /// Event loop poll interval.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// A crash within this long of starting counts as flapping.
    #[serde(default = "default_flap_window_secs")]
    pub flap_window_secs: u64,
    /// Cap for the exponential respawn backoff of a flapping slot.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            running_grace_ms: default_running_grace_ms(),
            reload_timeout_secs: default_reload_timeout_secs(),
            stop_timeout_secs: default_stop_timeout_secs(),
            drain_timeout_secs: default_drain_timeout_secs(),
            tick_ms: default_tick_ms(),
            flap_window_secs: default_flap_window_secs(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

impl TimingConfig {
    pub fn running_grace(&self) -> Duration {
        Duration::from_millis(self.running_grace_ms)
    }

    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.reload_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn flap_window(&self) -> Duration {
        Duration::from_secs(self.flap_window_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

/// Bounded spawn retry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Attempts per slot before it is abandoned (at least 1).
    #[serde(default = "default_spawn_attempts")]
    pub spawn_attempts: u32,
    /// Pause between failed spawn attempts.
    #[serde(default = "default_spawn_backoff_ms")]
    pub spawn_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            spawn_attempts: default_spawn_attempts(),
            spawn_backoff_ms: default_spawn_backoff_ms(),
        }
    }
}

/// Run directory settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathsConfig {
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            run_dir: default_run_dir(),
        }
    }
}

impl PathsConfig {
    /// Path of the master PID file.
    pub fn pid_path(&self) -> PathBuf {
        self.run_dir.join(PID_FILENAME)
    }

    /// Path of the status snapshot.
    pub fn state_path(&self) -> PathBuf {
        self.run_dir.join(STATE_FILENAME)
    }
}

fn default_workers() -> usize {
    1
}

fn default_running_grace_ms() -> u64 {
    1000
}

fn default_reload_timeout_secs() -> u64 {
    30
}

fn default_stop_timeout_secs() -> u64 {
    10
}

fn default_drain_timeout_secs() -> u64 {
    30
}

fn default_tick_ms() -> u64 {
    100
}

fn default_flap_window_secs() -> u64 {
    10
}

fn default_max_backoff_secs() -> u64 {
    30
}

fn default_spawn_attempts() -> u32 {
    3
}

fn default_spawn_backoff_ms() -> u64 {
    100
}

fn default_run_dir() -> PathBuf {
    PathBuf::from(".drover")
}

impl ClusterConfig {
    /// Parse a configuration from a TOML string.
    ///
    /// Only syntax and types are checked here; call [`Self::validate`] once
    /// CLI overrides have been applied.
    pub fn from_toml(content: &str) -> Result<Self, DroverError> {
        toml::from_str(content)
            .map_err(|e| DroverError::Config(format!("invalid cluster config: {e}")))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, DroverError> {
        toml::to_string_pretty(self)
            .map_err(|e| DroverError::Config(format!("failed to serialize config: {e}")))
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), DroverError> {
        match self.worker.program() {
            None => {
                return Err(DroverError::Config(
                    "worker.command must name a program to run".into(),
                ))
            }
            Some(p) if p.trim().is_empty() => {
                return Err(DroverError::Config("worker.command program is empty".into()))
            }
            Some(_) => {}
        }

        let scale = &self.scale;
        if let Some(max) = scale.max_workers {
            if scale.min_workers > max {
                return Err(DroverError::Config(format!(
                    "scale.min_workers ({}) exceeds scale.max_workers ({max})",
                    scale.min_workers
                )));
            }
            if scale.workers > max {
                return Err(DroverError::Config(format!(
                    "scale.workers ({}) exceeds scale.max_workers ({max})",
                    scale.workers
                )));
            }
        }
        if scale.workers < scale.min_workers {
            return Err(DroverError::Config(format!(
                "scale.workers ({}) is below scale.min_workers ({})",
                scale.workers, scale.min_workers
            )));
        }

        if self.retry.spawn_attempts == 0 {
            return Err(DroverError::Config(
                "retry.spawn_attempts must be at least 1".into(),
            ));
        }
        if self.timing.tick_ms == 0 {
            return Err(DroverError::Config("timing.tick_ms must be positive".into()));
        }

        Ok(())
    }

    /// A commented starting point written by `drover init`.
    pub fn example() -> Self {
        Self {
            worker: WorkerConfig {
                command: vec!["./bin/server".into(), "--port".into(), "8080".into()],
                ..WorkerConfig::default()
            },
            scale: ScaleConfig {
                workers: 2,
                min_workers: 1,
                max_workers: Some(16),
            },
            ..Self::default()
        }
    }
}
