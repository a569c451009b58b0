//! Worker process launcher and exit observer.

use std::io::{BufRead, BufReader, Read};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use drover_types::{DroverError, ExitNotice, OutputMode, SlotId, WorkerConfig, WorkerSignal};

use crate::process_tree;

/// Environment variable carrying the worker's slot number.
pub const SLOT_ENV: &str = "DROVER_SLOT";

/// Environment variable carrying the master's pid.
pub const MASTER_PID_ENV: &str = "DROVER_MASTER_PID";

/// Spawns and signals worker processes on behalf of the state machine.
///
/// Implementations must not block beyond process-creation latency. Exit is
/// never reported through the return values here: it arrives later as an
/// [`ExitNotice`] on the channel the launcher was built with.
pub trait Launcher {
    /// Launch a new worker for `slot` and return its OS pid.
    fn spawn(&mut self, slot: SlotId) -> Result<u32, DroverError>;

    /// Deliver `signal` to the worker `pid` occupying `slot`.
    ///
    /// A worker that already exited is not an error; its exit notice is
    /// either queued or about to be.
    fn terminate(&mut self, slot: SlotId, pid: u32, signal: WorkerSignal)
        -> Result<(), DroverError>;
}

/// Launches workers as real child processes.
///
/// Every child is placed in its own process group so terminal-generated
/// signals reach only the master, which then decides what the pool does.
pub struct ProcessLauncher<E> {
    template: WorkerConfig,
    master_pid: u32,
    exit_tx: mpsc::Sender<E>,
}

impl<E> ProcessLauncher<E>
where
    E: From<ExitNotice> + Send + 'static,
{
    /// Create a launcher that posts exit notices into `exit_tx`.
    pub fn new(template: WorkerConfig, exit_tx: mpsc::Sender<E>) -> Self {
        Self {
            template,
            master_pid: std::process::id(),
            exit_tx,
        }
    }

    fn build_command(&self, slot: SlotId) -> Result<Command, DroverError> {
        let program = self.template.program().ok_or_else(|| DroverError::Spawn {
            slot,
            reason: "no worker command configured".into(),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(self.template.args())
            .envs(&self.template.env)
            .env(SLOT_ENV, slot.get().to_string())
            .env(MASTER_PID_ENV, self.master_pid.to_string())
            .stdin(Stdio::null())
            .process_group(0);

        if let Some(dir) = &self.template.working_dir {
            cmd.current_dir(dir);
        }

        match self.template.output {
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            OutputMode::Log => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
        }

        Ok(cmd)
    }
}

impl<E> Launcher for ProcessLauncher<E>
where
    E: From<ExitNotice> + Send + 'static,
{
    fn spawn(&mut self, slot: SlotId) -> Result<u32, DroverError> {
        let mut cmd = self.build_command(slot)?;
        let mut child = cmd.spawn().map_err(|e| DroverError::Spawn {
            slot,
            reason: e.to_string(),
        })?;
        let pid = child.id();

        if let Some(stdout) = child.stdout.take() {
            forward_output(slot, pid, "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(slot, pid, "stderr", stderr);
        }

        let exit_tx = self.exit_tx.clone();
        let observer = thread::Builder::new()
            .name(format!("drover-exit-{}", slot.get()))
            .spawn(move || {
                let code = match child.wait() {
                    Ok(status) => exit_code(status),
                    Err(e) => {
                        warn!(slot = %slot, pid, error = %e, "waiting on worker failed");
                        -1
                    }
                };
                debug!(slot = %slot, pid, code, "worker exit observed");
                if exit_tx.send(E::from(ExitNotice { slot, pid, code })).is_err() {
                    debug!(slot = %slot, pid, "event queue closed, dropping exit notice");
                }
            });

        if let Err(e) = observer {
            // Without an observer nobody would ever report this child's exit.
            if let Ok(raw) = i32::try_from(pid) {
                let _ = signal::kill(Pid::from_raw(raw), Signal::SIGKILL);
            }
            return Err(DroverError::Spawn {
                slot,
                reason: format!("failed to start exit observer: {e}"),
            });
        }

        info!(slot = %slot, pid, "worker spawned");
        Ok(pid)
    }

    fn terminate(
        &mut self,
        slot: SlotId,
        pid: u32,
        signal: WorkerSignal,
    ) -> Result<(), DroverError> {
        let raw = i32::try_from(pid)
            .map_err(|_| DroverError::Signal(format!("pid {pid} out of range for {slot}")))?;

        match signal {
            WorkerSignal::Terminate => deliver(slot, raw, Signal::SIGTERM),
            WorkerSignal::Kill => {
                let signalled = process_tree::signal_tree(raw, Signal::SIGKILL)?;
                info!(slot = %slot, pid, signalled, "worker process tree killed");
                Ok(())
            }
            WorkerSignal::Custom(signo) => {
                let sig = Signal::try_from(signo).map_err(|e| {
                    DroverError::Signal(format!("invalid signal number {signo}: {e}"))
                })?;
                deliver(slot, raw, sig)
            }
        }
    }
}

/// Send a single signal, treating an already-gone process as success.
fn deliver(slot: SlotId, pid: i32, sig: Signal) -> Result<(), DroverError> {
    match signal::kill(Pid::from_raw(pid), sig) {
        Ok(()) => {
            debug!(slot = %slot, pid, signal = ?sig, "signal delivered");
            Ok(())
        }
        Err(nix::errno::Errno::ESRCH) => {
            debug!(slot = %slot, pid, signal = ?sig, "worker already gone (ESRCH)");
            Ok(())
        }
        Err(e) => Err(DroverError::Signal(format!(
            "failed to send {sig:?} to {slot} (pid {pid}): {e}"
        ))),
    }
}

/// Raw exit status: the exit code, or `128 + signo` for signal deaths.
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signo)) => 128 + signo,
        (None, None) => -1,
    }
}

/// Re-emit a worker's output stream as log events, one per line.
fn forward_output<R>(slot: SlotId, pid: u32, stream: &'static str, reader: R)
where
    R: Read + Send + 'static,
{
    let spawned = thread::Builder::new()
        .name(format!("drover-{stream}-{}", slot.get()))
        .spawn(move || {
            for line in BufReader::new(reader).lines() {
                match line {
                    Ok(line) => info!(slot = %slot, pid, stream, "{line}"),
                    Err(_) => break,
                }
            }
        });
    if let Err(e) = spawned {
        warn!(slot = %slot, pid, stream, error = %e, "failed to start output forwarder");
    }
}
