//! Smoke tests for the `drover` binary that need no running master.
//!
//! Every command runs with its working directory set to a temp dir, so the
//! default `drover.toml` and `.drover/` run directory stay isolated.

mod common;

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

use drover_types::{ClusterConfig, CONFIG_FILENAME};

use common::drover_bin;

fn drover_in(dir: &Path) -> Command {
    let mut cmd = Command::new(drover_bin());
    cmd.current_dir(dir);
    cmd
}

#[test]
fn help_lists_subcommands() {
    let tmp = tempfile::tempdir().unwrap();
    drover_in(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("scale-up")
                .and(predicate::str::contains("scale-down"))
                .and(predicate::str::contains("reload"))
                .and(predicate::str::contains("status")),
        );
}

#[test]
fn init_writes_config_once() {
    let tmp = tempfile::tempdir().unwrap();

    drover_in(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cluster config created"));

    let content = fs::read_to_string(tmp.path().join(CONFIG_FILENAME)).unwrap();
    let config = ClusterConfig::from_toml(&content).unwrap();
    config.validate().unwrap();

    drover_in(tmp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn status_without_master() {
    let tmp = tempfile::tempdir().unwrap();
    drover_in(tmp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("not running"));

    drover_in(tmp.path())
        .args(["status", "--json"])
        .assert()
        .failure();
}

#[test]
fn control_commands_need_a_master() {
    let tmp = tempfile::tempdir().unwrap();
    for subcommand in ["scale-up", "scale-down", "reload", "stop"] {
        drover_in(tmp.path())
            .arg(subcommand)
            .assert()
            .failure()
            .stderr(predicate::str::contains("no running master"));
    }
}

#[test]
fn start_without_config_or_command_exits_2() {
    let tmp = tempfile::tempdir().unwrap();
    drover_in(tmp.path())
        .arg("start")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("drover init"));
}

#[test]
fn start_rejects_invalid_config() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(
        tmp.path().join(CONFIG_FILENAME),
        "[worker]\ncommand = [\"sleep\", \"1\"]\n\n[scale]\nworkers = 4\nmax_workers = 2\n",
    )
    .unwrap();

    drover_in(tmp.path())
        .arg("start")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("max_workers"));
}
