//! SSBQ CLI - run SSB Q-learning experiments
//!
//! Runs one of the shipped problems with a chosen learner and prints a
//! summary per run; the full reports can be written out as JSON.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::unused_async)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::float_cmp)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{problems, run};

#[derive(Parser)]
#[command(name = "ssbq")]
#[command(author, version, about = "SSBQ - SSB Q-learning experiments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run simulations of a learner on a problem
    Run(run::RunArgs),

    /// List the available problems
    Problems,

    /// Configuration management
    #[command(subcommand)]
    Config(commands::config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = if cli.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ssbq_cli={log_level},ssbq_rl={log_level},ssbq_mdps={log_level},ssbq_core=warn")
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Run(args) => run::run(args).await,
        Commands::Problems => problems::list().await,
        Commands::Config(cmd) => commands::config::run(cmd).await,
    }
}
