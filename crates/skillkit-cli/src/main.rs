//! CLI entry point for skillkit.
//!
//! This binary provides the `skillkit` command with subcommands for media
//! processing, browser automation, Gemini multimodal processing, project
//! search, telemetry filtering, and bundle management.

mod ai;
mod browser;
mod cli;
mod media;
mod project;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; API keys often live there.
    let _ = dotenvy::dotenv();
    init_tracing("warn");

    let cli = Cli::parse();
    match cli.command {
        Commands::Media { action } => media::run(action).await,
        Commands::Browser { action } => browser::run(action).await,
        Commands::Ai { action } => ai::run(action).await,
        Commands::Search {
            pattern,
            include_external,
        } => project::run_search(&pattern, include_external).await,
        Commands::Log { output } => project::run_log(output),
        Commands::Manifest { action } => project::run_manifest(action),
        Commands::Thought(args) => project::run_thought(args),
        Commands::Doctor => project::run_doctor().await,
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
