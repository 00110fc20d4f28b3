//! Configuration management commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::{Settings, CONFIG_FILE};

const EXAMPLE_CONFIG: &str = include_str!("../../../../ssbq.toml.example");

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show {
        /// Configuration file to use instead of the default search
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Initialize configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn run(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show { config } => show(config.as_deref()).await,
        ConfigCommands::Init { force } => init(Path::new(CONFIG_FILE), force).await,
    }
}

async fn show(explicit: Option<&Path>) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    match explicit.map(Path::to_path_buf).or_else(Settings::find_config_file) {
        Some(path) => println!("Config file: {}\n", path.display()),
        None => println!("No configuration file found. Using defaults.\n"),
    }

    let settings = Settings::load(explicit)?;
    let rendered = toml::to_string_pretty(&settings).context("Failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}

async fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Configuration file created: {}", path.display());
    Ok(())
}
