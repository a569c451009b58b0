//! Control commands: signal the running master.
//!
//! The master listens for signals only, so `scale-up`, `scale-down`, `reload`
//! and `stop` each look up the master's PID file and deliver the matching
//! signal.

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use drover_cluster::persistence;

/// Pause between the two TERMs of a forced stop, so the master sees them as
/// separate deliveries.
const FORCE_GAP: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    ScaleUp,
    ScaleDown,
    Reload { hup: bool },
    Stop { force: bool },
}

impl Control {
    pub fn signal(self) -> Signal {
        match self {
            Control::ScaleUp => Signal::SIGTTIN,
            Control::ScaleDown => Signal::SIGTTOU,
            Control::Reload { hup: false } => Signal::SIGUSR2,
            Control::Reload { hup: true } => Signal::SIGWINCH,
            Control::Stop { .. } => Signal::SIGTERM,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Control::ScaleUp => "scale up",
            Control::ScaleDown => "scale down",
            Control::Reload { .. } => "reload",
            Control::Stop { force: false } => "stop",
            Control::Stop { force: true } => "force stop",
        }
    }
}

pub fn run(config_path: &Path, control: Control) -> Result<()> {
    let paths = super::run_paths(config_path)?;
    let pid_path = paths.pid_path();

    let Some(pid) = persistence::live_master(&pid_path) else {
        bail!(
            "no running master (PID file: {})\nStart one with: drover start",
            pid_path.display()
        );
    };
    let target = Pid::from_raw(i32::try_from(pid).context("master PID out of range")?);
    let sig = control.signal();

    kill(target, sig).with_context(|| format!("failed to send {} to PID {pid}", sig.as_str()))?;
    if let Control::Stop { force: true } = control {
        thread::sleep(FORCE_GAP);
        kill(target, sig)
            .with_context(|| format!("failed to send second {} to PID {pid}", sig.as_str()))?;
    }

    println!(
        "Requested {} (sent {} to master PID {pid}).",
        control.describe(),
        sig.as_str()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_match_master_routing() {
        for control in [
            Control::ScaleUp,
            Control::ScaleDown,
            Control::Reload { hup: false },
            Control::Reload { hup: true },
            Control::Stop { force: false },
        ] {
            let command = drover_cluster::route(control.signal() as i32);
            assert!(command.is_some(), "{control:?} is not routed by the master");
        }
    }

    #[test]
    fn no_master_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = tmp.path().join("drover.toml");
        std::fs::write(
            &config,
            format!(
                "[worker]\ncommand = [\"true\"]\n\n[paths]\nrun_dir = \"{}\"\n",
                tmp.path().join("run").display()
            ),
        )
        .unwrap();

        let err = run(&config, Control::ScaleUp).unwrap_err().to_string();
        assert!(err.contains("no running master"), "unexpected error: {err}");
    }
}
