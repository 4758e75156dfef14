//! Stride - Activity sync engine
//!
//! # Usage
//!
//! ```bash
//! # Sync the file-system connector in-process
//! stride sync file --fast
//!
//! # Run the background engine on a Unix socket, then drive it
//! stride serve
//! stride sync remote --connect
//! stride stop remote --connect
//! ```

mod cmd;
mod engine;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use stride_config::{Config, LogFormat, LogOutput};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Stride - Activity sync engine
#[derive(Parser, Debug)]
#[command(name = "stride")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a sync pass and print its events
    Sync(cmd::sync::SyncArgs),

    /// Stop a running sync pass on a served engine
    Stop(cmd::stop::StopArgs),

    /// Show connectors, sync dates and stored activities
    Status(cmd::status::StatusArgs),

    /// Forget the sync date of a connector
    Reset(cmd::reset::ResetArgs),

    /// List activities of the foreground library
    List(cmd::list::ListArgs),

    /// Recompute the derived metrics of an activity
    Compute(cmd::compute::ComputeArgs),

    /// Store remote API credentials
    Link(cmd::link::LinkArgs),

    /// Show the background runtime
    Info(cmd::info::InfoArgs),

    /// Run the background engine on a Unix socket (Unix only)
    #[cfg(unix)]
    Serve(cmd::serve::ServeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = engine::load_config(cli.config.as_deref())?;

    let log_level = resolve_log_level(cli.log_level.as_deref(), &config);
    init_logging(&log_level, &config)?;

    match cli.command {
        Command::Sync(args) => cmd::sync::run(args, &config).await,
        Command::Stop(args) => cmd::stop::run(args, &config).await,
        Command::Status(args) => cmd::status::run(args, &config).await,
        Command::Reset(args) => cmd::reset::run(args, &config).await,
        Command::List(args) => cmd::list::run(args, &config).await,
        Command::Compute(args) => cmd::compute::run(args, &config).await,
        Command::Link(args) => cmd::link::run(args, &config).await,
        Command::Info(args) => cmd::info::run(args, &config).await,
        #[cfg(unix)]
        Command::Serve(args) => cmd::serve::run(args, &config).await,
    }
}

/// Resolve log level: CLI flag > config file > default "info"
fn resolve_log_level(cli_level: Option<&str>, config: &Config) -> String {
    match cli_level {
        Some(level) => level.to_string(),
        None => config.log.level.as_str().to_string(),
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str, config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let compact = config.log.format == LogFormat::Compact;
    let layer = fmt::layer().with_target(!compact);
    let registry = tracing_subscriber::registry().with(filter);

    match (config.log.output, compact) {
        (LogOutput::Stderr, false) => registry.with(layer.with_writer(std::io::stderr)).init(),
        (LogOutput::Stderr, true) => registry
            .with(layer.compact().with_writer(std::io::stderr))
            .init(),
        (LogOutput::Stdout, false) => registry.with(layer.with_writer(std::io::stdout)).init(),
        (LogOutput::Stdout, true) => registry
            .with(layer.compact().with_writer(std::io::stdout))
            .init(),
    }

    Ok(())
}

