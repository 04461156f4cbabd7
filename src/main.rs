mod board;
mod branch;
mod cli;
mod config;
mod error;
mod git;
mod jobs;
mod labels;
mod mirror;
mod model;
mod providers;
mod webhook;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load config
    let config = config::load_config()?;

    // One tracker (and HTTP session) for the whole process
    let tracker = providers::create_tracker(&config)?;
    tracing::debug!(backend = tracker.name(), "tracker ready");

    cli::run(cli, config, tracker).await
}
