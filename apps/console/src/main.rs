use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console_core::{EventLog, HttpAccessControlClient, WorkflowController};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod render;
mod runner;

use config::{load_settings, validate_api_url};
use render::LogRenderer;
use runner::Console;

/// Console for driving a multi-authority ABE service.
#[derive(Parser, Debug)]
#[command(name = "abe-console", version)]
struct Cli {
    /// Base URL of the access-control API, e.g. http://localhost:8080/api
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Settings file; defaults to ./console.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Per-request timeout in seconds, 0 disables it
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read commands from stdin (default)
    Interactive,
    /// Run the scripted bootstrap, issue, encrypt and decrypt walkthrough
    Demo {
        #[arg(long, default_value = "DOCTOR@HOSPITAL")]
        policy: String,
        #[arg(long, default_value = "patient record")]
        payload: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }
    if let Some(timeout_secs) = cli.timeout_secs {
        settings.request_timeout_secs = timeout_secs;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    validate_api_url(&settings.api_url)?;
    let client =
        HttpAccessControlClient::with_timeout(&settings.api_url, settings.request_timeout())
            .context("failed to build access-control client")?;
    info!(
        api_url = %settings.api_url,
        timeout_secs = settings.request_timeout_secs,
        "console starting"
    );

    let log = Arc::new(EventLog::new());
    let renderer = LogRenderer::spawn(&log);
    let controller = WorkflowController::new(Arc::new(client), Arc::clone(&log));
    let console = Console::new(&controller).with_renderer(renderer.progress());

    match cli.command.unwrap_or(Command::Interactive) {
        Command::Interactive => console.run_interactive().await?,
        Command::Demo { policy, payload } => console.run_demo(&policy, &payload).await,
    }

    // The renderer drains once the last handle to the log is gone.
    drop(console);
    drop(controller);
    drop(log);
    renderer.finish().await.context("log renderer task failed")?;
    Ok(())
}
