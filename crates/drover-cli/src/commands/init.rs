//! `drover init`: write a starting configuration.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use drover_types::ClusterConfig;

const HEADER: &str = "\
# drover cluster configuration.
#
# Signals to the master (or the matching drover subcommands):
#   TTIN scale up, TTOU scale down, USR2 rolling reload,
#   HUP/WINCH full reload, TERM/INT stop (twice to force).

";

pub fn run(path: &Path, force: bool) -> Result<()> {
    write_example(path, force)?;

    println!("Cluster config created at: {}", path.display());
    println!();
    println!("Set worker.command to your server, then start the master with:");
    println!("  drover start --config {}", path.display());
    Ok(())
}

fn write_example(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "cluster config already exists at {}\nEdit it directly or pass --force to overwrite.",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let toml_str = ClusterConfig::example().to_toml()?;
    fs::write(path, format!("{HEADER}{toml_str}"))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_parseable_example() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("conf").join("drover.toml");

        write_example(&path, false).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# drover cluster configuration."));

        let config = ClusterConfig::from_toml(&content).unwrap();
        assert_eq!(config, ClusterConfig::example());
        config.validate().unwrap();
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("drover.toml");
        fs::write(&path, "# mine").unwrap();

        let err = write_example(&path, false).unwrap_err().to_string();
        assert!(err.contains("already exists"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "# mine");

        write_example(&path, true).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("[worker]"));
    }
}
