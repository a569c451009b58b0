//! CLI command implementations for the `drover` binary.

pub mod init;
pub mod signal;
pub mod start;
pub mod status;

use std::path::Path;

use anyhow::{Context, Result};

use drover_types::{ClusterConfig, PathsConfig};

/// Read and parse a cluster configuration file (not yet validated).
pub fn load_config(path: &Path) -> Result<ClusterConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(ClusterConfig::from_toml(&content)?)
}

/// Run directory settings from `path`, or the defaults when it doesn't exist.
pub fn run_paths(path: &Path) -> Result<PathsConfig> {
    if path.exists() {
        Ok(load_config(path)?.paths)
    } else {
        Ok(PathsConfig::default())
    }
}
