//! Events on the master's serialized queue.

use drover_types::{Command, ExitNotice};

/// Everything the state machine reacts to, besides the passage of time.
///
/// Signals are translated to commands before they get here, so the machine
/// never distinguishes "the operator asked" from "a process exited" by
/// source, only by payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterEvent {
    Command(Command),
    Exited(ExitNotice),
}

impl From<Command> for ClusterEvent {
    fn from(command: Command) -> Self {
        ClusterEvent::Command(command)
    }
}

impl From<ExitNotice> for ClusterEvent {
    fn from(notice: ExitNotice) -> Self {
        ClusterEvent::Exited(notice)
    }
}
