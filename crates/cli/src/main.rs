//! Energy platform session CLI

mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(name = "energy")]
#[command(about = "Manage and use an energy platform session")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "info")]
    log_level: LogLevel,

    /// Data directory for sessions and logs
    #[arg(short = 'd', long, global = true, env = "ENERGY_STATE_DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Navigation path the session is used from; `/dashboard/<uid>` selects the dashboard session
    #[arg(short = 'p', long, global = true, default_value = "/")]
    path: String,

    /// Timeout for operations in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true, default_value = "0")]
    timeout: u64,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = config::resolve_data_dir(cli.data_dir.clone());
    logging::init_logging(cli.log_level.into(), &data_dir, cli.no_file_log)?;

    info!("Starting energy CLI");

    let settings = config::load_config(cli.config.as_deref())?;
    let context = commands::CommandContext::new(settings, &data_dir, &cli.path);

    let outcome = if cli.timeout == 0 {
        cli.command.execute(&context).await
    } else {
        let timeout_duration = Duration::from_secs(cli.timeout);
        match tokio::time::timeout(timeout_duration, cli.command.execute(&context)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("Command timed out after {} seconds", cli.timeout);
                std::process::exit(1);
            }
        }
    };

    match outcome {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {e:#}");
            std::process::exit(1);
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}
