//! `drover start`: run the master in the foreground.
//!
//! Exit codes: 0 when the pool drained cleanly on stop, 1 when workers had
//! to be force-killed, 2 when the master could not start at all.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Result};
use tracing::error;

use drover_cluster::ClusterRuntime;
use drover_types::ClusterConfig;

const STARTUP_FAILURE: u8 = 2;

pub fn run(config_path: &Path, workers: Option<usize>, command: Vec<String>) -> ExitCode {
    let config = match prepare(config_path, workers, command) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("drover: {e:#}");
            return ExitCode::from(STARTUP_FAILURE);
        }
    };

    let mut runtime = ClusterRuntime::new(config);
    match runtime.run() {
        Ok(result) => ExitCode::from(u8::try_from(result.exit_code()).unwrap_or(1)),
        Err(e) => {
            error!(error = %e, "master failed to start");
            eprintln!("drover: {e}");
            ExitCode::from(STARTUP_FAILURE)
        }
    }
}

/// Load the config file (if any), apply CLI overrides, and validate.
fn prepare(
    config_path: &Path,
    workers: Option<usize>,
    command: Vec<String>,
) -> Result<ClusterConfig> {
    let mut config = if config_path.exists() {
        super::load_config(config_path)?
    } else if !command.is_empty() {
        ClusterConfig::default()
    } else {
        bail!(
            "no config at {} and no worker command given\nRun 'drover init' or pass the command after --",
            config_path.display()
        );
    };

    apply_overrides(&mut config, workers, command);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut ClusterConfig, workers: Option<usize>, command: Vec<String>) {
    if let Some(workers) = workers {
        config.scale.workers = workers;
    }
    if !command.is_empty() {
        config.worker.command = command;
    }
}
