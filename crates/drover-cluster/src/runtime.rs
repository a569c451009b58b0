//! The master's event loop.
//!
//! One thread owns the [`Cluster`] and the receiving end of the event queue.
//! Exit observers (one per worker) and the signal listener only ever send
//! into the queue, so no state is shared between threads.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use drover_launcher::ProcessLauncher;
use drover_types::{ClusterConfig, Command, DrainResult, DroverError, Operation};

use crate::event::ClusterEvent;
use crate::machine::Cluster;
use crate::persistence;
use crate::signals::SignalRouter;
use crate::state::ClusterSnapshot;

/// Snapshot refresh interval while no events arrive.
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

pub struct ClusterRuntime {
    cluster: Cluster<ProcessLauncher<ClusterEvent>>,
    events: mpsc::Receiver<ClusterEvent>,
    sender: mpsc::Sender<ClusterEvent>,
    config: ClusterConfig,
    master_pid: u32,
    started_at: DateTime<Utc>,
    last_snapshot: Instant,
}

impl ClusterRuntime {
    /// Build a runtime for a validated configuration. Nothing is spawned yet.
    pub fn new(config: ClusterConfig) -> Self {
        let (sender, events) = mpsc::channel();
        let launcher = ProcessLauncher::new(config.worker.clone(), sender.clone());
        Self {
            cluster: Cluster::new(&config, launcher),
            events,
            sender,
            config,
            master_pid: std::process::id(),
            started_at: Utc::now(),
            last_snapshot: Instant::now(),
        }
    }

    /// Run the master until a stop has fully drained the pool.
    ///
    /// Claims the PID file, installs the signal router, forms the pool, and
    /// processes events. The PID file and snapshot are removed on the way out.
    pub fn run(&mut self) -> Result<DrainResult, DroverError> {
        let pid_path = self.config.paths.pid_path();
        persistence::claim_pid_file(&pid_path)?;

        let result = match SignalRouter::install(self.sender.clone()) {
            Ok(_router) => self.supervise(),
            Err(e) => Err(e),
        };

        persistence::remove_pid_file(&pid_path);
        ClusterSnapshot::remove(&self.config.paths.state_path());
        result
    }

    /// Form the pool and process events until drained. Signals are not
    /// intercepted; commands arrive on the event queue.
    fn supervise(&mut self) -> Result<DrainResult, DroverError> {
        info!(
            master_pid = self.master_pid,
            workers = self.cluster.desired(),
            command = ?self.config.worker.command,
            "master starting"
        );

        if let Err(e) = self.cluster.start(Instant::now()) {
            error!(error = %e, "cluster formation failed, draining");
            let result = self.drain();
            info!(?result, "startup aborted");
            return Err(e);
        }
        self.save_snapshot();

        while self.cluster.operation() != Operation::Stopping {
            self.step();
        }
        Ok(self.drain())
    }

    /// Drain the pool: issue a stop if none is in progress, then process
    /// exits until every worker is gone or force-killed.
    fn drain(&mut self) -> DrainResult {
        if self.cluster.operation() != Operation::Stopping {
            self.cluster
                .handle(ClusterEvent::Command(Command::Stop), Instant::now());
        }

        loop {
            if let Some(result) = self.cluster.drain_result() {
                let result = result.clone();
                match &result {
                    DrainResult::Clean => info!("all workers exited, master stopping"),
                    DrainResult::Forced { slots } => {
                        warn!(forced = slots.len(), "drain forced, master stopping")
                    }
                }
                return result;
            }
            self.step();
        }
    }

    /// Wait up to one tick for an event, then run time-driven work.
    fn step(&mut self) {
        let tick = self.config.timing.tick();
        match self.events.recv_timeout(tick) {
            Ok(event) => {
                self.cluster.handle(event, Instant::now());
                while let Ok(event) = self.events.try_recv() {
                    self.cluster.handle(event, Instant::now());
                }
                self.cluster.tick(Instant::now());
                self.save_snapshot();
            }
            Err(RecvTimeoutError::Timeout) => {
                self.cluster.tick(Instant::now());
                if self.last_snapshot.elapsed() >= SNAPSHOT_INTERVAL {
                    self.save_snapshot();
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                // The runtime holds a sender, so this only happens on teardown.
                error!("{}", DroverError::QueueClosed);
                self.cluster
                    .handle(ClusterEvent::Command(Command::Stop), Instant::now());
                std::thread::sleep(tick);
                self.cluster.tick(Instant::now());
            }
        }
    }

    fn save_snapshot(&mut self) {
        let snapshot =
            ClusterSnapshot::capture(&self.cluster, self.master_pid, self.started_at, Instant::now());
        if let Err(e) = snapshot.save(&self.config.paths.state_path()) {
            warn!(error = %e, "failed to write state snapshot");
        }
        self.last_snapshot = Instant::now();
    }
}
