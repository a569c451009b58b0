//! OS process plumbing for the drover master.
//!
//! Spawns worker processes from a fixed command template, watches each one
//! from a dedicated exit-observer thread, and delivers signals to them. The
//! cluster state machine only ever sees two things from this crate: the pid
//! returned by a spawn, and the [`drover_types::ExitNotice`] posted when that
//! pid terminates.
//!
//! # Architecture
//!
//! - [`launcher::Launcher`]: the seam the state machine drives (spawn/terminate)
//! - [`launcher::ProcessLauncher`]: the real implementation over `std::process`
//! - [`process_tree`]: leaf-first signalling of a worker's whole process tree
//! - [`retry`]: bounded spawn retry with explicit give-up

pub mod launcher;
pub mod process_tree;
pub mod retry;

pub use launcher::{Launcher, ProcessLauncher};
pub use retry::{spawn_with_retry, SpawnFailure, SpawnRetry};
