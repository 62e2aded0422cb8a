//! clusterlink entry point.

mod config;
mod monitor;
mod transfer;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Moves data between cloud storage and a Hadoop cluster and reports cluster
/// activity to a coordinator.
#[derive(Parser, Debug)]
#[command(name = "clusterlink", version, about)]
struct Cli {
    /// Configuration file (defaults to ~/.config/clusterlink/clusterlink.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy gs:// -> filesystem, filesystem -> gs://, or http(s):// -> filesystem
    Transfer {
        source: String,
        destination: String,
        /// Coordinator operation id; progress goes to stdout without it
        operation: Option<String>,
    },
    /// Poll the job tracker and report snapshots until interrupted
    Monitor,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Stdout carries progress lines; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting clusterlink");

    let config = config::Config::load(cli.config.as_deref())?;

    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Command::Transfer {
            source,
            destination,
            operation,
        } => rt.block_on(transfer::run(
            &config,
            &source,
            &destination,
            operation.as_deref(),
        )),
        Command::Monitor => {
            rt.block_on(monitor::run(&config))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
