mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use drover_types::CONFIG_FILENAME;

use crate::commands::signal::Control;

/// drover -- keeps a pool of worker processes converged to a desired size.
#[derive(Parser, Debug)]
#[command(name = "drover", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write an example cluster configuration
    Init {
        /// Where to write the configuration
        #[arg(long, default_value = CONFIG_FILENAME)]
        config: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Run the master in the foreground until stopped
    Start {
        /// Cluster configuration file
        #[arg(long, default_value = CONFIG_FILENAME)]
        config: PathBuf,

        /// Initial number of workers (overrides scale.workers)
        #[arg(long)]
        workers: Option<usize>,

        /// Worker command and arguments (overrides worker.command)
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Ask the running master for one more worker
    ScaleUp {
        #[arg(long, default_value = CONFIG_FILENAME)]
        config: PathBuf,
    },

    /// Ask the running master for one less worker
    ScaleDown {
        #[arg(long, default_value = CONFIG_FILENAME)]
        config: PathBuf,
    },

    /// Replace every worker, one at a time
    Reload {
        #[arg(long, default_value = CONFIG_FILENAME)]
        config: PathBuf,

        /// Use the hang-up reload signal (SIGWINCH) instead of SIGUSR2
        #[arg(long)]
        hup: bool,
    },

    /// Drain the pool and stop the master
    Stop {
        #[arg(long, default_value = CONFIG_FILENAME)]
        config: PathBuf,

        /// Skip the drain timeout and force-kill workers right away
        #[arg(long)]
        force: bool,
    },

    /// Show the master's current status
    Status {
        #[arg(long, default_value = CONFIG_FILENAME)]
        config: PathBuf,

        /// Print the raw JSON snapshot
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    // RUST_LOG wins; otherwise info for drover's own crates.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("drover=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { config, force } => commands::init::run(&config, force)?,
        Commands::Start {
            config,
            workers,
            command,
        } => return Ok(commands::start::run(&config, workers, command)),
        Commands::ScaleUp { config } => commands::signal::run(&config, Control::ScaleUp)?,
        Commands::ScaleDown { config } => commands::signal::run(&config, Control::ScaleDown)?,
        Commands::Reload { config, hup } => commands::signal::run(&config, Control::Reload { hup })?,
        Commands::Stop { config, force } => commands::signal::run(&config, Control::Stop { force })?,
        Commands::Status { config, json } => commands::status::run(&config, json)?,
    }
    Ok(ExitCode::SUCCESS)
}
