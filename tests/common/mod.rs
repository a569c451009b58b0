//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::{Duration, Instant};

use drover_cluster::persistence;
use drover_types::{ClusterConfig, PathsConfig, ScaleConfig, TimingConfig, WorkerConfig};

static BUILD_ONCE: Once = Once::new();

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("tests/ should have a parent")
        .to_path_buf()
}

/// Ensure the drover binary is built, then return its path.
pub fn drover_bin() -> PathBuf {
    let root = workspace_root();

    BUILD_ONCE.call_once(|| {
        let status = std::process::Command::new("cargo")
            .args(["build", "-p", "drover-cli"])
            .current_dir(&root)
            .status()
            .expect("failed to invoke cargo build");
        assert!(status.success(), "cargo build -p drover-cli failed");
    });

    let bin = root.join("target").join("debug").join("drover");
    assert!(bin.exists(), "drover binary not found at {}", bin.display());
    bin
}

/// Poll `cond` every 20ms until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

pub fn pid_alive(pid: u32) -> bool {
    persistence::is_process_alive(pid)
}

/// A cluster of `sleep 300` workers with short grace intervals.
pub fn sleep_config(run_dir: &Path, workers: usize) -> ClusterConfig {
    ClusterConfig {
        worker: WorkerConfig {
            command: vec!["sleep".into(), "300".into()],
            ..WorkerConfig::default()
        },
        scale: ScaleConfig {
            workers,
            min_workers: 0,
            max_workers: Some(8),
        },
        timing: TimingConfig {
            running_grace_ms: 200,
            reload_timeout_secs: 10,
            stop_timeout_secs: 5,
            drain_timeout_secs: 10,
            tick_ms: 20,
            ..TimingConfig::default()
        },
        paths: PathsConfig {
            run_dir: run_dir.to_path_buf(),
        },
        ..ClusterConfig::default()
    }
}

/// Write `config` as `drover.toml` under `dir` and return its path.
pub fn write_config(dir: &Path, config: &ClusterConfig) -> PathBuf {
    let path = dir.join("drover.toml");
    let toml_str = config.to_toml().expect("should serialize config to TOML");
    std::fs::write(&path, toml_str).expect("should write config file");
    path
}
