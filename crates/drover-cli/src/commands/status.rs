//! `drover status`: show the master's latest snapshot.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Result};

use drover_cluster::{persistence, ClusterSnapshot};

/// Faults shown in the human-readable view; `--json` has all of them.
const RECENT_FAULTS: usize = 5;

pub fn run(config_path: &Path, json: bool) -> Result<()> {
    let paths = super::run_paths(config_path)?;
    let master = persistence::live_master(&paths.pid_path());
    let snapshot = ClusterSnapshot::load(&paths.state_path());

    if json {
        match (master, snapshot) {
            (Some(_), Some(snapshot)) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            _ => bail!("no running master"),
        }
        return Ok(());
    }

    let Some(pid) = master else {
        println!("Master: not running");
        return Ok(());
    };
    match snapshot {
        Some(snapshot) => print!("{}", render(&snapshot)),
        None => println!("Master: running (PID {pid}), no status snapshot yet"),
    }
    Ok(())
}

fn render(snapshot: &ClusterSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Master:     running (PID {})", snapshot.master_pid);
    let _ = writeln!(
        out,
        "Started:    {}",
        snapshot.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "Workers:    {} running / {} desired",
        snapshot.running(),
        snapshot.desired
    );
    match snapshot.reload {
        Some(kind) => {
            let _ = writeln!(out, "Operation:  {} ({kind:?})", snapshot.operation);
        }
        None => {
            let _ = writeln!(out, "Operation:  {}", snapshot.operation);
        }
    }
    if snapshot.queued_commands > 0 || snapshot.pending_respawns > 0 {
        let _ = writeln!(
            out,
            "Pending:    {} queued command(s), {} respawn(s)",
            snapshot.queued_commands, snapshot.pending_respawns
        );
    }

    if !snapshot.workers.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "  {:<10} {:>8}  {:<12} {:<12} {:>4}  {:>8}",
            "SLOT", "PID", "STATE", "ROLE", "GEN", "UPTIME"
        );
        for w in &snapshot.workers {
            let _ = writeln!(
                out,
                "  {:<10} {:>8}  {:<12} {:<12} {:>4}  {:>7}s",
                w.slot.to_string(),
                w.pid,
                w.state.to_string(),
                format!("{:?}", w.role).to_lowercase(),
                w.generation,
                w.uptime_secs
            );
        }
    }

    if !snapshot.faults.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Recent faults:");
        let skip = snapshot.faults.len().saturating_sub(RECENT_FAULTS);
        for fault in snapshot.faults.iter().skip(skip) {
            let _ = writeln!(out, "  - {fault}");
        }
    }
    out
}
