//! Headlens CLI binary entrypoint.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use headlens_api::HttpClient;
use headlens_core::Aggregator;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use headlens_cli::cli::{Cli, Commands};
use headlens_cli::commands::{MachinesCommand, OverviewCommand, UsersCommand};
use headlens_cli::config::{FileConfig, Settings};
use headlens_cli::output::OutputFormat;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_level))
        .with_writer(io::stderr)
        .init();

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let file = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    Ok(Settings::resolve(cli, file)?)
}

async fn run(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    debug!(url = %settings.url, policy = ?settings.aggregator.policy, "Resolved settings");

    let client = HttpClient::new(&settings.url, settings.api_key.clone())
        .context("failed to create headscale client")?;
    let aggregator = Aggregator::new(Arc::new(client), settings.aggregator);
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Machines => {
            MachinesCommand::new(&aggregator)
                .execute(&mut stdout, &format)
                .await
                .context("failed to render machines")?;
        }
        Commands::Users => {
            UsersCommand::new(&aggregator)
                .execute(&mut stdout, &format)
                .await
                .context("failed to render users")?;
        }
        Commands::Overview => {
            OverviewCommand::new(&aggregator, &settings.url)
                .execute(&mut stdout, &format)
                .await
                .context("failed to render overview")?;
        }
    }

    Ok(())
}
