//! Error types shared across all drover crates.

use crate::ids::SlotId;

/// Errors that can occur across the drover runtime.
///
/// Per-worker failures that the supervisor recovers from on its own are
/// reported as [`crate::ClusterFault`] instead; these errors are the ones a
/// caller has to handle.
#[derive(Debug, thiserror::Error)]
pub enum DroverError {
    #[error("failed to spawn worker for {slot}: {reason}")]
    Spawn { slot: SlotId, reason: String },

    #[error("signal delivery failed: {0}")]
    Signal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("pid file error: {0}")]
    PidFile(String),

    #[error("state snapshot error: {0}")]
    State(String),

    #[error("event queue closed")]
    QueueClosed,
}
