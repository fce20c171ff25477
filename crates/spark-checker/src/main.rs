//! Spark checker entry point
//!
//! `check` runs a single retrieval check by hand. `queue` reads disputes as
//! JSON lines from stdin and writes one JSON result line per dispute.

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use spark_retrieval::SparkConfig;
use tracing::error;

mod commands;
mod jsonl;
mod logging;

use commands::{check, queue};

//-----------------------------------------------------------------------------
// Command Definition
//-----------------------------------------------------------------------------

/// Verifies that storage providers serve the content they advertise
#[derive(Debug, Parser)]
#[command(name = "spark-checker", version, about = "Retrieval checks for disputed deals")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "SPARK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter directives, overrides the configuration
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check one CID against one storage provider and print the measurement
    Check(check::CheckArgs),

    /// Process disputes read as JSON lines from stdin
    Queue(queue::QueueArgs),
}

//-----------------------------------------------------------------------------
// Main Function
//-----------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            process::exit(2);
        }
    };

    let log_level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let json_logs = cli.json_logs || config.logging.json;
    if let Err(err) = logging::init_tracing(Some(log_level), Some(json_logs)) {
        eprintln!("Error: cannot initialize logging: {:#}", err);
        process::exit(2);
    }

    let result = match cli.command {
        Command::Check(args) => check::run(&config, args).await,
        Command::Queue(args) => queue::run(&config, args).await,
    };

    if let Err(err) = result {
        error!(error = %format!("{:#}", err), "Fatal error");
        eprintln!("Error: {:#}", err);
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<SparkConfig> {
    match &cli.config {
        Some(path) => SparkConfig::load(path),
        None => {
            let mut config = SparkConfig::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }
}
