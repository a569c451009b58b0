//! drover cluster: the master process supervising a pool of workers.
//!
//! The master keeps a pool of identical worker processes converged to a
//! desired size. Operators steer it with signals (scale up/down, reload,
//! stop); workers are observed only through their exit notices.
//!
//! # Architecture
//!
//! - [`machine::Cluster`]: the state machine, sole owner of the pool
//! - [`handle::WorkerHandle`]: the record for one worker process
//! - [`event::ClusterEvent`]: what flows through the serialized queue
//! - [`signals`]: OS signal to command routing
//! - [`shutdown::ShutdownCoordinator`]: drain tracking on stop
//! - [`runtime::ClusterRuntime`]: the event loop wiring it all to real processes
//! - [`persistence`]: master PID file
//! - [`state`]: `state.json` status snapshot

pub mod event;
pub mod handle;
pub mod machine;
pub mod persistence;
pub mod runtime;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use event::ClusterEvent;
pub use handle::{Lineage, WorkerHandle};
pub use machine::Cluster;
pub use runtime::ClusterRuntime;
pub use shutdown::{DrainPoll, ShutdownCoordinator};
pub use signals::{route, SignalRouter};
pub use state::{ClusterSnapshot, WorkerRole, WorkerSnapshot};
