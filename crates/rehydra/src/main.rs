//! Rehydra - drive the disconnected/connected cache handshake from the
//! command line.
//!
//! Main entry point for the `rehydra` CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;

mod commands;

use commands::{config, simulate};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Rehydra - one-time rehydration cache for two-pass rendering
#[derive(Parser)]
#[command(name = "rehydra")]
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
    #[arg(long, global = true, env = "REHYDRA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for daily-rotated JSON logs
    #[arg(long, global = true, env = "REHYDRA_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a disconnected pass and a connected pass against an in-process cache
    Simulate(simulate::SimulateArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => {
            let config = rehydra_config::load_config_file(path)?;
            config.validate()?;
            rehydra_config::LoadedConfig {
                config,
                sources: vec![rehydra_config::ConfigSource {
                    path: path.clone(),
                    loaded: true,
                }],
                warnings: Vec::new(),
            }
        }
        None => rehydra_config::load_config(None)?,
    };

    // Console (human-readable, stderr) + optional rotating JSON file
    let filter = if cli.verbose {
        "rehydra=debug,rehydra_cache=debug,rehydra_config=debug,info".to_string()
    } else {
        loaded
            .config
            .log_filter()
            .unwrap_or("rehydra=info,rehydra_cache=info,warn")
            .to_string()
    };

    let log_dir = cli
        .log_dir
        .clone()
        .or_else(|| loaded.config.json_log_dir().map(PathBuf::from));
    let (json_layer, _guard) = match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(&dir, "rehydra.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "rehydra=trace,rehydra_cache=trace,rehydra_config=trace,info",
                ));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(json_layer)
        .init();

    for warning in &loaded.warnings {
        tracing::warn!("{warning}");
    }

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config: loaded,
    };

    match cli.command {
        Commands::Simulate(args) => simulate::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
