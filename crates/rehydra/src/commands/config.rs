//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use rehydra_config::{CONFIG_FILE, RehydraConfig, save_config, xdg_config_path};
use serde::Serialize;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration and which files it came from
    Show,

    /// Show the user configuration file path
    Path,

    /// Write a config file with every default spelled out
    Init {
        /// Create project-local config (./rehydra.toml) instead of user config
        #[arg(long)]
        local: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
        ConfigCommand::Init { local, force } => cmd_init(local, force, ctx),
    }
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    ttl_ms: u64,
    sweep_every_ms: u64,
    log_filter: Option<&'a str>,
    loaded_from: Vec<String>,
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = &ctx.config;
    let config = &loaded.config;
    let loaded_from: Vec<String> = loaded
        .loaded_from()
        .iter()
        .map(|p| p.display().to_string())
        .collect();

    if ctx.json_output {
        let output = ShowOutput {
            ttl_ms: config.ttl_ms(),
            sweep_every_ms: config.sweep_every_ms(),
            log_filter: config.log_filter(),
            loaded_from,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("# Rehydra Configuration\n");
    if loaded_from.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        for path in &loaded_from {
            println!("# loaded from {path}");
        }
        println!();
    }

    println!("[cache]");
    println!("ttl_ms = {}", config.ttl_ms());
    println!("sweep_every_ms = {}", config.sweep_every_ms());
    if let Some(filter) = config.log_filter() {
        println!("\n[logging]");
        println!("filter = {filter:?}");
    }
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let Some(path) = xdg_config_path() else {
        bail!("Could not determine the user config directory");
    };
    if ctx.json_output {
        println!("{}", serde_json::json!({ "path": path.display().to_string() }));
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

fn cmd_init(local: bool, force: bool, ctx: &Context) -> Result<()> {
    let path = if local {
        PathBuf::from(CONFIG_FILE)
    } else {
        match xdg_config_path() {
            Some(path) => path,
            None => bail!("Could not determine the user config directory"),
        }
    };

    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    save_config(&RehydraConfig::with_defaults(), &path)?;

    if ctx.json_output {
        println!("{}", serde_json::json!({ "created": path.display().to_string() }));
    } else {
        println!("Created {}", path.display());
    }
    Ok(())
}
