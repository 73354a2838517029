//! shoal - clustered session store tooling
//!
//! Main entry point for the shoal CLI.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, key, simulate};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// shoal - clustered session store tooling
#[derive(Parser)]
#[command(name = "shoal")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of discovery
    #[arg(long, global = true, env = "SHOAL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encode or decode a session cache key
    Key(key::KeyArgs),

    /// Show the resolved configuration
    Config(config::ConfigArgs),

    /// Simulate a cluster sharing one cache
    Simulate(simulate::SimulateArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = shoal_config::load_config(cli.config.as_deref())
        .context("failed to load configuration")?;

    // Console (human-readable) + optional rotating JSON file
    let filter = if cli.verbose {
        "shoal=debug,shoal_session=debug,shoal_config=debug,info".to_string()
    } else {
        loaded.config.logging.level.clone()
    };

    let file_layer = loaded.config.logging.dir.as_ref().map(|dir| {
        let file_appender = tracing_appender::rolling::daily(dir, "shoal.log");
        tracing_appender::non_blocking(file_appender)
    });
    let (file_writer, _guard) = match file_layer {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "shoal=trace,shoal_session=trace,shoal_config=trace,info",
                ))
        }))
        .init();

    tracing::debug!(sources = ?loaded.loaded_from, "Configuration loaded");

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config: loaded.config,
        loaded_from: loaded.loaded_from,
    };

    match cli.command {
        Commands::Key(args) => key::run(args, &ctx),
        Commands::Config(args) => config::run(args, &ctx),
        Commands::Simulate(args) => simulate::run(args, &ctx).await,
    }
}
