//! Core types shared across all drover crates.
//!
//! Defines worker identity and lifecycle states, supervisor commands, exit
//! notices, cluster faults, configuration, and the error type used by the
//! launcher, the cluster state machine, and the CLI.

pub mod cluster;
pub mod config;
pub mod error;
pub mod ids;

pub use cluster::{
    ClusterFault, Command, DrainResult, ExitNotice, Operation, ReloadKind, WorkerSignal,
    WorkerState,
};
pub use config::{
    ClusterConfig, OutputMode, PathsConfig, RetryConfig, ScaleConfig, TimingConfig, WorkerConfig,
    CONFIG_FILENAME, PID_FILENAME, STATE_FILENAME,
};
pub use error::DroverError;
pub use ids::SlotId;
