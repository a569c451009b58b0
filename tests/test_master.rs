//! End-to-end tests that run the `drover` master as a child process and
//! steer it through the CLI's control commands.
//!
//! The binary is built on first use (`cargo build -p drover-cli`).

mod common;

use std::fs;
use std::path::Path;
use std::process::{Child, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

use drover_cluster::persistence;
use drover_types::{PID_FILENAME, STATE_FILENAME};

use common::{drover_bin, pid_alive, sleep_config, wait_until, write_config};

const SETTLE: Duration = Duration::from_secs(15);

fn control(config: &Path, subcommand: &str) -> Command {
    let mut cmd = Command::new(drover_bin());
    cmd.args([subcommand, "--config"]).arg(config);
    cmd
}

fn spawn_master(config: &Path) -> Child {
    std::process::Command::new(drover_bin())
        .args(["start", "--config"])
        .arg(config)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("should spawn drover master")
}

/// Wait for the master to exit and return its exit code.
fn wait_exit(child: &mut Child, timeout: Duration) -> Option<i32> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait().expect("try_wait") {
            return status.code();
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    let _ = child.kill();
    None
}

fn read_state(run_dir: &Path) -> Option<Value> {
    let content = fs::read_to_string(run_dir.join(STATE_FILENAME)).ok()?;
    serde_json::from_str(&content).ok()
}

/// Active running worker PIDs in the latest snapshot.
fn running_pids(state: &Value) -> Vec<u32> {
    state["workers"]
        .as_array()
        .map(|workers| {
            workers
                .iter()
                .filter(|w| w["role"] == "active" && w["state"] == "running")
                .filter_map(|w| w["pid"].as_u64())
                .map(|pid| pid as u32)
                .collect()
        })
        .unwrap_or_default()
}

fn wait_for_pool(run_dir: &Path, desired: u64) -> Vec<u32> {
    let mut pids = Vec::new();
    let settled = wait_until(SETTLE, || match read_state(run_dir) {
        Some(state) => {
            pids = running_pids(&state);
            state["desired"] == desired
                && state["operation"] == "idle"
                && pids.len() as u64 == desired
        }
        None => false,
    });
    assert!(settled, "pool never settled at {desired} worker(s)");
    pids
}

#[test]
fn test_master_scale_reload_stop() {
    let tmp = tempfile::tempdir().unwrap();
    let run_dir = tmp.path().join("run");
    let config = write_config(tmp.path(), &sleep_config(&run_dir, 1));

    let mut master = spawn_master(&config);
    let first = wait_for_pool(&run_dir, 1);
    let master_pid = persistence::read_pid(&run_dir.join(PID_FILENAME)).expect("PID file");
    assert_eq!(master_pid, master.id());

    // A second master on the same run directory is refused
    Command::new(drover_bin())
        .args(["start", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already running"));

    control(&config, "scale-up")
        .assert()
        .success()
        .stdout(predicate::str::contains("SIGTTIN"));
    let two = wait_for_pool(&run_dir, 2);
    assert!(two.contains(&first[0]));

    control(&config, "status")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 running / 2 desired"));

    let output = control(&config, "status").arg("--json").output().unwrap();
    assert!(output.status.success());
    let snapshot: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(snapshot["master_pid"], master_pid);

    control(&config, "scale-down").assert().success();
    let one = wait_for_pool(&run_dir, 1);
    assert_eq!(one, first, "scale-down should retire the newest worker");

    control(&config, "reload").assert().success();
    assert!(wait_until(SETTLE, || {
        read_state(&run_dir).is_some_and(|s| {
            let pids = running_pids(&s);
            s["operation"] == "idle" && pids.len() == 1 && pids[0] != first[0]
        })
    }));
    assert!(wait_until(SETTLE, || !pid_alive(first[0])));
    let replacement = running_pids(&read_state(&run_dir).unwrap());

    control(&config, "stop").assert().success();
    assert_eq!(wait_exit(&mut master, SETTLE), Some(0));
    assert!(!run_dir.join(PID_FILENAME).exists());
    assert!(!run_dir.join(STATE_FILENAME).exists());
    assert!(!pid_alive(replacement[0]));
}

#[test]
fn test_master_exits_2_when_workers_cannot_start() {
    let tmp = tempfile::tempdir().unwrap();
    let run_dir = tmp.path().join("run");
    let mut cluster = sleep_config(&run_dir, 2);
    cluster.worker.command = vec![tmp.path().join("missing").display().to_string()];
    cluster.retry.spawn_backoff_ms = 0;
    let config = write_config(tmp.path(), &cluster);

    Command::new(drover_bin())
        .args(["start", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("slot-1"));
    assert!(!run_dir.join(PID_FILENAME).exists());
}

#[test]
fn test_sigterm_to_master_drains_workers() {
    let tmp = tempfile::tempdir().unwrap();
    let run_dir = tmp.path().join("run");
    let config = write_config(tmp.path(), &sleep_config(&run_dir, 2));

    let mut master = spawn_master(&config);
    let pids = wait_for_pool(&run_dir, 2);

    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(master.id() as i32),
        nix::sys::signal::Signal::SIGTERM,
    )
    .unwrap();

    assert_eq!(wait_exit(&mut master, SETTLE), Some(0));
    for pid in pids {
        assert!(!pid_alive(pid), "worker {pid} outlived the master");
    }
}

#[test]
fn test_master_hup_reload_replaces_worker() {
    let tmp = tempfile::tempdir().unwrap();
    let run_dir = tmp.path().join("run");
    let config = write_config(tmp.path(), &sleep_config(&run_dir, 1));

    let mut master = spawn_master(&config);
    let first = wait_for_pool(&run_dir, 1);

    control(&config, "reload")
        .arg("--hup")
        .assert()
        .success()
        .stdout(predicate::str::contains("SIGWINCH"));
    assert!(wait_until(SETTLE, || {
        read_state(&run_dir).is_some_and(|s| {
            let pids = running_pids(&s);
            s["operation"] == "idle" && pids.len() == 1 && pids[0] != first[0]
        })
    }));
    assert!(wait_until(SETTLE, || !pid_alive(first[0])));
    let replacement = running_pids(&read_state(&run_dir).unwrap());

    control(&config, "stop").assert().success();
    assert_eq!(wait_exit(&mut master, SETTLE), Some(0));
    assert!(!pid_alive(replacement[0]));
}

#[test]
fn test_forced_stop_kills_term_ignoring_workers() {
    let tmp = tempfile::tempdir().unwrap();
    let run_dir = tmp.path().join("run");
    let mut cluster = sleep_config(&run_dir, 2);
    cluster.worker.command = vec![
        "/bin/sh".into(),
        "-c".into(),
        "trap '' TERM; sleep 300".into(),
    ];
    cluster.timing.drain_timeout_secs = 120;
    let config = write_config(tmp.path(), &cluster);

    let mut master = spawn_master(&config);
    let pids = wait_for_pool(&run_dir, 2);

    control(&config, "stop")
        .arg("--force")
        .assert()
        .success()
        .stdout(predicate::str::contains("force stop"));

    assert_eq!(wait_exit(&mut master, SETTLE), Some(1));
    assert!(!run_dir.join(PID_FILENAME).exists());
    for pid in pids {
        assert!(wait_until(SETTLE, || !pid_alive(pid)), "worker {pid} survived a forced stop");
    }
}
