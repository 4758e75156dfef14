//! Sync command - Run one sync pass and print its events
//!
//! # Usage
//!
//! ```bash
//! stride sync file            # full pass
//! stride sync remote --fast   # only activities newer than the last sync
//! stride sync file --force    # re-emit everything, even unchanged records
//! ```
//!
//! Ctrl-C asks the pass to stop; it ends at its next checkpoint.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use stride_config::Config;
use stride_protocol::{ConnectorType, SyncEventKind};

use crate::cmd::ConnectArgs;
use crate::engine::Session;
use crate::output::{PassSummary, event_line};

/// Sync command arguments
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Connector to sync (remote, file)
    #[arg(value_name = "CONNECTOR")]
    pub connector: ConnectorType,

    /// Only fetch activities newer than the last successful sync
    #[arg(long)]
    pub fast: bool,

    /// Re-emit activities even when unchanged
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub target: ConnectArgs,
}

/// Run the sync command
pub async fn run(args: SyncArgs, config: &Config) -> Result<()> {
    let session = Session::open(config, args.target.connect).await?;
    let client = session.client().clone();

    let stopper = {
        let client = client.clone();
        let connector = args.connector;
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("stopping {} sync...", connector);
                let _ = client.stop_sync(connector).await;
            }
        })
    };

    let mut summary = PassSummary::default();
    let terminal = client
        .sync_and_wait(args.connector, args.fast, args.force, |event| {
            summary.record(event);
            println!("{}", event_line(event));
        })
        .await;
    stopper.abort();
    session.close().await;

    let terminal = terminal.with_context(|| format!("{} sync did not run", args.connector))?;
    info!(
        connector = %args.connector,
        new = summary.new,
        updated = summary.updated,
        errors = summary.errors,
        "sync finished"
    );
    println!(
        "{} new, {} updated, {} errors",
        summary.new, summary.updated, summary.errors
    );

    match terminal.kind {
        SyncEventKind::Error { error, fatal: true } => {
            anyhow::bail!("{} sync failed: {}", args.connector, error)
        }
        _ => Ok(()),
    }
}
