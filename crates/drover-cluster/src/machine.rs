//! Cluster state machine: the single owner of the worker pool.
//!
//! Every mutation of the pool goes through [`Cluster::handle`] (a command or
//! an exit notice) or [`Cluster::tick`] (the passage of time). Both take the
//! current `Instant` from the caller, so the whole machine can be driven by
//! a test with synthetic time and a scripted [`Launcher`].
//!
//! At most one structural operation is in flight. Commands that arrive
//! meanwhile are either absorbed into the current operation (a scale in the
//! same direction), dropped (a reload while one is already pending), or
//! queued and started in receipt order once the pool settles. `Stop`
//! preempts everything and is terminal.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use drover_launcher::{spawn_with_retry, Launcher, SpawnRetry};
use drover_types::{
    ClusterConfig, ClusterFault, Command, DrainResult, DroverError, ExitNotice, Operation,
    ReloadKind, ScaleConfig, SlotId, TimingConfig, WorkerSignal, WorkerState,
};

use crate::event::ClusterEvent;
use crate::handle::{Lineage, WorkerHandle};
use crate::shutdown::{DrainPoll, ShutdownCoordinator};

/// Recent faults kept for the status snapshot.
const FAULT_HISTORY: usize = 32;

/// A slot waiting to be respawned.
#[derive(Debug, Clone, Copy)]
struct Respawn {
    due: Instant,
    lineage: Lineage,
}

/// One-slot-at-a-time replacement of the pool.
#[derive(Debug)]
struct ReloadProgress {
    kind: ReloadKind,
    /// Slots not yet replaced, in slot order.
    remaining: VecDeque<SlotId>,
    /// Replacement for the slot currently being reloaded.
    incoming: Option<WorkerHandle>,
    /// When `incoming` must be running by.
    deadline: Instant,
    /// Pid of the incumbent that was just retired. The next slot waits for it.
    outgoing: Option<u32>,
    /// Failed spawns of the replacement for the slot at the head of `remaining`.
    spawn_failures: u32,
    /// When to try that spawn again.
    retry_at: Option<Instant>,
}

/// The supervisor's authoritative view of the pool.
pub struct Cluster<L> {
    launcher: L,
    scale: ScaleConfig,
    timing: TimingConfig,
    retry: SpawnRetry,
    desired: usize,
    operation: Operation,
    workers: BTreeMap<SlotId, WorkerHandle>,
    /// Stopping workers that no longer own a slot, keyed by pid.
    retiring: BTreeMap<u32, WorkerHandle>,
    respawns: BTreeMap<SlotId, Respawn>,
    reload: Option<ReloadProgress>,
    pending: VecDeque<Command>,
    next_slot: SlotId,
    shutdown: Option<ShutdownCoordinator>,
    faults: VecDeque<ClusterFault>,
}

impl<L: Launcher> Cluster<L> {
    pub fn new(config: &ClusterConfig, launcher: L) -> Self {
        Self {
            launcher,
            scale: config.scale.clone(),
            timing: config.timing.clone(),
            retry: SpawnRetry::from(&config.retry),
            desired: config.scale.clamp(config.scale.workers as i64),
            operation: Operation::Idle,
            workers: BTreeMap::new(),
            retiring: BTreeMap::new(),
            respawns: BTreeMap::new(),
            reload: None,
            pending: VecDeque::new(),
            next_slot: SlotId::new(1),
            shutdown: None,
            faults: VecDeque::new(),
        }
    }

    /// Form the initial pool.
    ///
    /// A worker that cannot be spawned at all (after retries) is fatal here:
    /// already spawned workers are sent SIGTERM, the machine enters
    /// `Stopping`, and the error is returned so the caller can drain.
    pub fn start(&mut self, now: Instant) -> Result<(), DroverError> {
        info!(workers = self.desired, "forming cluster");
        if self.desired > 0 {
            self.operation = Operation::ScalingUp;
        }

        for _ in 0..self.desired {
            let slot = self.allocate_slot();
            match spawn_with_retry(&mut self.launcher, slot, &self.retry) {
                Ok(pid) => {
                    self.workers
                        .insert(slot, WorkerHandle::spawned(slot, pid, Lineage::default(), now));
                }
                Err(failure) => {
                    self.begin_stop(now);
                    return Err(DroverError::Spawn {
                        slot,
                        reason: failure.to_string(),
                    });
                }
            }
        }

        self.advance(now);
        Ok(())
    }

    /// Apply one event from the queue.
    pub fn handle(&mut self, event: ClusterEvent, now: Instant) {
        match event {
            ClusterEvent::Command(command) => self.submit(command, now),
            ClusterEvent::Exited(notice) => self.on_exit(notice, now),
        }
        self.advance(now);
    }

    /// Time-driven work: promotions, stop escalation, due respawns, timeouts.
    pub fn tick(&mut self, now: Instant) {
        self.escalate_stops(now);
        self.advance(now);
    }

    pub fn desired(&self) -> usize {
        self.desired
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Slot owners, in slot order.
    pub fn workers(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.workers.values()
    }

    pub fn worker(&self, slot: SlotId) -> Option<&WorkerHandle> {
        self.workers.get(&slot)
    }

    /// Workers that were replaced or abandoned and are waiting to exit.
    pub fn retiring(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.retiring.values()
    }

    /// The reload replacement currently starting, if any.
    pub fn incoming(&self) -> Option<&WorkerHandle> {
        self.reload.as_ref().and_then(|r| r.incoming.as_ref())
    }

    pub fn reload_kind(&self) -> Option<ReloadKind> {
        self.reload.as_ref().map(|r| r.kind)
    }

    pub fn running_count(&self) -> usize {
        self.workers.values().filter(|w| w.is_running()).count()
    }

    pub fn queued_commands(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_respawns(&self) -> usize {
        self.respawns.len()
    }

    /// Most recent faults, oldest first.
    pub fn faults(&self) -> impl Iterator<Item = &ClusterFault> {
        self.faults.iter()
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Idle with nothing queued and exactly `desired` running workers.
    pub fn is_settled(&self) -> bool {
        self.operation == Operation::Idle
            && self.pending.is_empty()
            && self.respawns.is_empty()
            && self.retiring.is_empty()
            && self.workers.len() == self.desired
            && self.workers.values().all(WorkerHandle::is_running)
    }

    pub fn drain_result(&self) -> Option<&DrainResult> {
        self.shutdown.as_ref().and_then(ShutdownCoordinator::result)
    }

    pub fn is_stopped(&self) -> bool {
        self.drain_result().is_some()
    }

    // -- commands ---------------------------------------------------------

    fn submit(&mut self, command: Command, now: Instant) {
        if self.operation == Operation::Stopping {
            if command == Command::Stop {
                warn!("repeated stop request, force-killing remaining workers");
                if let Some(shutdown) = self.shutdown.as_mut() {
                    shutdown.force_now(now);
                }
            } else {
                debug!(?command, "ignoring command while stopping");
            }
            return;
        }

        match command {
            Command::Stop => self.begin_stop(now),
            Command::ScaleBy(delta) => {
                let same_direction = matches!(
                    (self.operation, delta.signum()),
                    (Operation::ScalingUp, 1) | (Operation::ScalingDown, -1)
                );
                if self.operation == Operation::Idle || same_direction {
                    self.apply_scale(delta);
                } else {
                    debug!(delta, operation = %self.operation, "queueing scale request");
                    self.pending.push_back(command);
                }
            }
            Command::RollingReload | Command::FullReload => {
                let reload_pending = self.reload.is_some()
                    || self.pending.iter().any(|c| c.reload_kind().is_some());
                if reload_pending {
                    info!(?command, "reload already pending, dropping request");
                } else if self.operation == Operation::Idle {
                    self.begin_reload(command, now);
                } else {
                    debug!(?command, operation = %self.operation, "queueing reload request");
                    self.pending.push_back(command);
                }
            }
        }
    }

    fn start_queued(&mut self, command: Command, now: Instant) {
        match command {
            Command::ScaleBy(delta) => self.apply_scale(delta),
            Command::RollingReload | Command::FullReload => self.begin_reload(command, now),
            Command::Stop => self.begin_stop(now),
        }
    }

    fn apply_scale(&mut self, delta: i32) {
        let target = self.scale.clamp(self.desired as i64 + i64::from(delta));
        if target == self.desired {
            warn!(
                delta,
                desired = self.desired,
                min = self.scale.min_workers,
                max = ?self.scale.max_workers,
                "scale request would not change the desired count, ignoring"
            );
            return;
        }

        info!(from = self.desired, to = target, "desired worker count changed");
        if self.operation == Operation::Idle {
            self.operation = if target > self.desired {
                Operation::ScalingUp
            } else {
                Operation::ScalingDown
            };
        }
        self.desired = target;
    }

    fn begin_reload(&mut self, command: Command, now: Instant) {
        let Some(kind) = command.reload_kind() else {
            return;
        };
        let remaining: VecDeque<SlotId> = self.workers.keys().copied().collect();
        info!(?kind, workers = remaining.len(), "reload started");
        self.operation = Operation::Reloading;
        self.reload = Some(ReloadProgress {
            kind,
            remaining,
            incoming: None,
            deadline: now,
            outgoing: None,
            spawn_failures: 0,
            retry_at: None,
        });
    }

    fn begin_stop(&mut self, now: Instant) {
        info!(
            workers = self.workers.len(),
            retiring = self.retiring.len(),
            dropped_commands = self.pending.len(),
            "stop requested, draining pool"
        );
        self.operation = Operation::Stopping;
        self.pending.clear();
        self.respawns.clear();

        if let Some(incoming) = self.reload.take().and_then(|r| r.incoming) {
            self.retiring.insert(incoming.pid, incoming);
        }

        let mut to_signal = Vec::new();
        for worker in self.workers.values_mut().chain(self.retiring.values_mut()) {
            if !worker.is_stopping() {
                worker.mark_stopping(now);
                to_signal.push((worker.slot, worker.pid));
            }
        }
        for (slot, pid) in to_signal {
            self.send(slot, pid, WorkerSignal::Terminate);
        }

        let outstanding = self
            .workers
            .values()
            .chain(self.retiring.values())
            .map(|w| (w.slot, w.pid));
        self.shutdown = Some(ShutdownCoordinator::begin(
            outstanding,
            now,
            self.timing.drain_timeout(),
        ));
    }

    // -- exits ------------------------------------------------------------

    fn on_exit(&mut self, notice: ExitNotice, now: Instant) {
        let ExitNotice { slot, pid, code } = notice;
        if let Some(shutdown) = self.shutdown.as_mut() {
            shutdown.on_exit(pid);
        }

        if let Some(handle) = self.retiring.remove(&pid) {
            info!(slot = %slot, pid, code, generation = handle.generation, "retired worker exited");
            return;
        }

        if let Some(reload) = self.reload.as_mut() {
            if reload.incoming.as_ref().is_some_and(|w| w.pid == pid) {
                reload.incoming = None;
                self.record(ClusterFault::ReplacementFailed {
                    slot,
                    reason: format!("exited with code {code} before reaching running"),
                });
                return;
            }
        }

        if !self.workers.get(&slot).is_some_and(|w| w.pid == pid) {
            debug!(slot = %slot, pid, code, "exit notice for an untracked process");
            return;
        }
        let Some(mut handle) = self.workers.remove(&slot) else {
            return;
        };
        let previous = handle.state;
        handle.state = WorkerState::Exited { code };

        match previous {
            WorkerState::Stopping => {
                info!(slot = %slot, pid, code, "worker exited");
            }
            WorkerState::Starting => self.on_start_failure(handle, code, now),
            WorkerState::Running => self.on_unexpected_exit(handle, code, now),
            WorkerState::Exited { .. } => {}
        }
    }

    /// A worker died before reaching `Running`.
    fn on_start_failure(&mut self, handle: WorkerHandle, code: i32, now: Instant) {
        warn!(slot = %handle.slot, pid = handle.pid, code, "worker exited while starting");
        self.schedule_retry(
            handle.slot,
            handle.lineage(),
            format!("exited with code {code} before reaching running"),
            now,
        );
    }

    /// Count one more failed start for `slot` and either queue a respawn
    /// after the spawn backoff or give the slot up.
    fn schedule_retry(&mut self, slot: SlotId, lineage: Lineage, reason: String, now: Instant) {
        let failures = lineage.start_failures + 1;
        if failures >= self.retry.attempts {
            self.abandon(slot, failures, reason);
            return;
        }

        warn!(
            slot = %slot,
            failures,
            max_attempts = self.retry.attempts,
            backoff_ms = self.retry.backoff.as_millis() as u64,
            %reason,
            "start failed, retrying"
        );
        self.respawns.insert(
            slot,
            Respawn {
                due: now + self.retry.backoff,
                lineage: Lineage {
                    start_failures: failures,
                    ..lineage
                },
            },
        );
    }

    /// A running worker died without being asked to.
    fn on_unexpected_exit(&mut self, handle: WorkerHandle, code: i32, now: Instant) {
        let slot = handle.slot;
        self.record(ClusterFault::UnexpectedExit {
            slot,
            pid: handle.pid,
            code,
        });

        let mut lineage = handle.lineage();
        let delay = if handle.uptime(now) < self.timing.flap_window() {
            lineage.quick_crashes += 1;
            respawn_backoff(lineage.quick_crashes, self.timing.max_backoff())
        } else {
            lineage.quick_crashes = 0;
            Duration::ZERO
        };

        info!(
            slot = %slot,
            delay_secs = delay.as_secs(),
            quick_crashes = lineage.quick_crashes,
            "scheduling respawn"
        );
        self.respawns.insert(
            slot,
            Respawn {
                due: now + delay,
                lineage,
            },
        );
    }

    // -- progress ---------------------------------------------------------

    /// Drive the in-flight operation as far as it can go right now, then
    /// start queued commands until something has to wait.
    fn advance(&mut self, now: Instant) {
        self.promote_ready(now);
        if self.operation != Operation::Stopping {
            self.run_due_respawns(now);
        }

        loop {
            let finished = match self.operation {
                Operation::Idle => match self.pending.pop_front() {
                    Some(command) => {
                        self.start_queued(command, now);
                        continue;
                    }
                    None => return,
                },
                Operation::ScalingUp => self.step_scale_up(now),
                Operation::ScalingDown => self.step_scale_down(now),
                Operation::Reloading => self.step_reload(now),
                Operation::Stopping => {
                    self.step_shutdown(now);
                    return;
                }
            };
            if !finished {
                return;
            }
            info!(
                operation = %self.operation,
                workers = self.workers.len(),
                desired = self.desired,
                "operation complete"
            );
            self.operation = Operation::Idle;
        }
    }

    fn step_scale_up(&mut self, now: Instant) -> bool {
        loop {
            while self.live_count() < self.desired {
                let slot = self.allocate_slot();
                self.launch(slot, Lineage::default(), now);
            }
            if !self.respawns.values().any(|r| r.due <= now) {
                break;
            }
            self.run_due_respawns(now);
        }
        self.respawns.is_empty() && !self.workers.values().any(WorkerHandle::is_starting)
    }

    fn step_scale_down(&mut self, now: Instant) -> bool {
        let mut excess = self.live_count().saturating_sub(self.desired);

        while excess > 0 {
            let Some((&slot, _)) = self.respawns.iter().next_back() else {
                break;
            };
            self.respawns.remove(&slot);
            info!(slot = %slot, "cancelled pending respawn");
            excess -= 1;
        }

        while excess > 0 {
            let Some(slot) = self.newest_active_worker() else {
                break;
            };
            self.stop_worker(slot, now);
            excess -= 1;
        }

        !self.workers.values().any(WorkerHandle::is_stopping)
    }

    fn step_reload(&mut self, now: Instant) -> bool {
        loop {
            let Some(reload) = self.reload.as_mut() else {
                return true;
            };

            if let Some(pid) = reload.outgoing {
                if self.retiring.contains_key(&pid) {
                    return false;
                }
                reload.outgoing = None;
            }

            if let Some(at) = reload.retry_at {
                if now < at {
                    return false;
                }
                reload.retry_at = None;
            }

            if let Some(incoming) = &reload.incoming {
                if incoming.is_running() {
                    self.install_replacement(now);
                } else if now >= reload.deadline {
                    self.abandon_replacement(now);
                } else {
                    return false;
                }
                continue;
            }

            let mut next = None;
            while let Some(slot) = reload.remaining.pop_front() {
                if self.workers.contains_key(&slot) {
                    next = Some(slot);
                    break;
                }
                debug!(slot = %slot, "slot left the pool before its reload, skipping");
                reload.spawn_failures = 0;
            }
            let Some(slot) = next else {
                info!(kind = ?reload.kind, "reload complete");
                self.reload = None;
                return true;
            };

            let lineage = self
                .workers
                .get(&slot)
                .map(|w| Lineage {
                    generation: w.generation,
                    ..Lineage::default()
                })
                .unwrap_or_default();

            match self.launcher.spawn(slot) {
                Ok(pid) => {
                    info!(slot = %slot, pid, kind = ?reload.kind, "replacement worker spawned");
                    reload.incoming = Some(WorkerHandle::spawned(slot, pid, lineage, now));
                    reload.deadline = now + self.timing.reload_timeout();
                    reload.spawn_failures = 0;
                    return false;
                }
                Err(e) => {
                    reload.spawn_failures += 1;
                    if reload.spawn_failures < self.retry.attempts {
                        warn!(
                            slot = %slot,
                            failures = reload.spawn_failures,
                            error = %e,
                            "replacement spawn failed, retrying"
                        );
                        reload.remaining.push_front(slot);
                        reload.retry_at = Some(now + self.retry.backoff);
                        continue;
                    }
                    let attempts = reload.spawn_failures;
                    reload.spawn_failures = 0;
                    self.record(ClusterFault::ReplacementFailed {
                        slot,
                        reason: format!("spawn failed after {attempts} attempt(s): {e}"),
                    });
                }
            }
        }
    }

    /// Swap a running replacement into its slot and retire the incumbent.
    fn install_replacement(&mut self, now: Instant) {
        let Some(reload) = self.reload.as_mut() else {
            return;
        };
        let Some(incoming) = reload.incoming.take() else {
            return;
        };
        let slot = incoming.slot;
        let new_pid = incoming.pid;
        self.respawns.remove(&slot);

        match self.workers.insert(slot, incoming) {
            Some(mut old) => {
                old.mark_stopping(now);
                let old_pid = old.pid;
                info!(slot = %slot, old_pid, new_pid, "replacement running, retiring previous worker");
                reload.outgoing = Some(old_pid);
                self.retiring.insert(old_pid, old);
                self.send(slot, old_pid, WorkerSignal::Terminate);
            }
            None => {
                info!(slot = %slot, new_pid, "replacement running in vacated slot");
            }
        }
    }

    /// Kill a replacement that missed its deadline; the incumbent stays.
    fn abandon_replacement(&mut self, now: Instant) {
        let Some(mut incoming) = self.reload.as_mut().and_then(|r| r.incoming.take()) else {
            return;
        };
        let slot = incoming.slot;
        let pid = incoming.pid;
        incoming.mark_stopping(now);
        incoming.force_killed = true;
        self.retiring.insert(pid, incoming);
        self.send(slot, pid, WorkerSignal::Kill);
        self.record(ClusterFault::ReloadTimeout { slot });
    }

    fn step_shutdown(&mut self, now: Instant) {
        let Some(shutdown) = self.shutdown.as_mut() else {
            return;
        };
        match shutdown.poll(now) {
            DrainPoll::Pending => {}
            DrainPoll::Overdue(stragglers) => {
                self.record(ClusterFault::DrainTimeout {
                    slots: stragglers.iter().map(|(slot, _)| *slot).collect(),
                });
                for (slot, pid) in stragglers {
                    self.force_kill(slot, pid);
                }
            }
            DrainPoll::Done(_) => {
                self.workers.clear();
                self.retiring.clear();
            }
        }
    }

    fn promote_ready(&mut self, now: Instant) {
        let grace = self.timing.running_grace();
        for worker in self.workers.values_mut() {
            if worker.promote_if_ready(now, grace) {
                info!(
                    slot = %worker.slot,
                    pid = worker.pid,
                    generation = worker.generation,
                    "worker running"
                );
            }
        }
        if let Some(incoming) = self.reload.as_mut().and_then(|r| r.incoming.as_mut()) {
            if incoming.promote_if_ready(now, grace) {
                info!(slot = %incoming.slot, pid = incoming.pid, "replacement worker running");
            }
        }
    }

    fn run_due_respawns(&mut self, now: Instant) {
        let due: Vec<SlotId> = self
            .respawns
            .iter()
            .filter(|(_, r)| r.due <= now)
            .map(|(slot, _)| *slot)
            .collect();

        for slot in due {
            if self.incoming().is_some_and(|w| w.slot == slot) {
                continue;
            }
            let Some(respawn) = self.respawns.remove(&slot) else {
                continue;
            };
            if self.active_workers() >= self.desired {
                info!(slot = %slot, "pool already at desired size, dropping respawn");
                continue;
            }
            info!(slot = %slot, generation = respawn.lineage.generation + 1, "respawning worker");
            self.launch(slot, respawn.lineage, now);
        }
    }

    /// SIGKILL workers that outlived the stop timeout. A drain has its own
    /// deadline, so nothing is escalated while stopping.
    fn escalate_stops(&mut self, now: Instant) {
        if self.operation == Operation::Stopping {
            return;
        }
        let timeout = self.timing.stop_timeout();
        let overdue: Vec<(SlotId, u32)> = self
            .workers
            .values()
            .chain(self.retiring.values())
            .filter(|w| w.stop_overdue(now, timeout))
            .map(|w| (w.slot, w.pid))
            .collect();

        for (slot, pid) in overdue {
            warn!(slot = %slot, pid, timeout_secs = timeout.as_secs(), "worker ignored SIGTERM, escalating to SIGKILL");
            self.force_kill(slot, pid);
        }
    }

    // -- helpers ----------------------------------------------------------

    fn allocate_slot(&mut self) -> SlotId {
        let slot = self.next_slot;
        self.next_slot = slot.next();
        slot
    }

    /// Non-stopping slot owners.
    fn active_workers(&self) -> usize {
        self.workers.values().filter(|w| !w.is_stopping()).count()
    }

    /// Slots that are, or are about to be, served.
    fn live_count(&self) -> usize {
        self.active_workers() + self.respawns.len()
    }

    fn newest_active_worker(&self) -> Option<SlotId> {
        self.workers
            .values()
            .filter(|w| !w.is_stopping())
            .max_by_key(|w| (w.started_at, w.slot))
            .map(|w| w.slot)
    }

    /// Spawn a worker into `slot`. A failed spawn is retried through the
    /// respawn schedule, so the event loop never sleeps here.
    fn launch(&mut self, slot: SlotId, lineage: Lineage, now: Instant) {
        match self.launcher.spawn(slot) {
            Ok(pid) => {
                self.workers
                    .insert(slot, WorkerHandle::spawned(slot, pid, lineage, now));
            }
            Err(e) => self.schedule_retry(slot, lineage, e.to_string(), now),
        }
    }

    fn abandon(&mut self, slot: SlotId, attempts: u32, reason: String) {
        self.desired = self.desired.saturating_sub(1);
        info!(slot = %slot, desired = self.desired, "slot abandoned, desired count reduced");
        self.record(ClusterFault::SpawnExhausted {
            slot,
            attempts,
            reason,
        });
    }

    fn stop_worker(&mut self, slot: SlotId, now: Instant) {
        let Some(worker) = self.workers.get_mut(&slot) else {
            return;
        };
        worker.mark_stopping(now);
        let pid = worker.pid;
        info!(slot = %slot, pid, "stopping worker");
        self.send(slot, pid, WorkerSignal::Terminate);
    }

    fn force_kill(&mut self, slot: SlotId, pid: u32) {
        let handle = match self.workers.get_mut(&slot) {
            Some(w) if w.pid == pid => Some(w),
            _ => self.retiring.get_mut(&pid),
        };
        if let Some(handle) = handle {
            handle.force_killed = true;
        }
        self.send(slot, pid, WorkerSignal::Kill);
    }

    fn send(&mut self, slot: SlotId, pid: u32, signal: WorkerSignal) {
        if let Err(e) = self.launcher.terminate(slot, pid, signal) {
            warn!(slot = %slot, pid, ?signal, error = %e, "failed to signal worker");
        }
    }

    fn record(&mut self, fault: ClusterFault) {
        warn!(%fault, "worker fault");
        if self.faults.len() == FAULT_HISTORY {
            self.faults.pop_front();
        }
        self.faults.push_back(fault);
    }
}

/// `2^n` seconds, capped.
fn respawn_backoff(quick_crashes: u32, cap: Duration) -> Duration {
    let secs = 1u64.checked_shl(quick_crashes).unwrap_or(u64::MAX);
    Duration::from_secs(secs).min(cap)
}
