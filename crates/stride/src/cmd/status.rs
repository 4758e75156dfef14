//! Status command - Connectors, sync dates and stored activities
//!
//! Reads the state files directly; nothing is modified.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use stride_config::Config;
use stride_protocol::{ConnectorInfo, ConnectorType};
use stride_store::{
    ActivityStore, ConnectorInfoStore, JsonActivityStore, JsonConnectorInfoStore,
    JsonSyncStateStore, SyncStateStore,
};

use crate::cmd::ConnectArgs;
use crate::engine::Session;

/// Status command arguments
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also ask a running `stride serve` which passes are in flight
    #[command(flatten)]
    pub target: ConnectArgs,
}

/// Run the status command
pub async fn run(args: StatusArgs, config: &Config) -> Result<()> {
    let infos = JsonConnectorInfoStore::new(config.sync.connector_info_path());
    let sync_state = JsonSyncStateStore::new(config.sync.state_path());
    let library_path = config.sync.library_path();
    let library = JsonActivityStore::open(&library_path)
        .await
        .with_context(|| format!("failed to open {}", library_path.display()))?;

    let running = if args.target.connect {
        let session = Session::open(config, true).await?;
        let info = session.client().runtime_info().await;
        session.close().await;
        info.context("failed to query the background")?.running_syncs
    } else {
        Vec::new()
    };

    for connector_type in ConnectorType::ALL {
        let configured = config.connectors.for_type(connector_type).is_some();
        let stored = infos.get(connector_type).await?;
        let last = sync_state
            .get(connector_type)
            .await?
            .map(|m| m.date_time());
        let count = library.list(Some(connector_type)).await?.len();

        println!(
            "{:<7} {:<15} last sync: {:<17} activities: {}{}",
            connector_type.as_str(),
            describe_setup(configured, stored.as_ref()),
            describe_date(last),
            count,
            if running.contains(&connector_type) {
                "  (syncing)"
            } else {
                ""
            }
        );
    }
    Ok(())
}

fn describe_setup(configured: bool, stored: Option<&ConnectorInfo>) -> &'static str {
    match stored {
        Some(ConnectorInfo::Remote(remote)) if remote.is_linked() => "linked",
        Some(ConnectorInfo::Remote(_)) => "not linked",
        Some(ConnectorInfo::FileSystem(fs)) if fs.source_directory.is_some() => "configured",
        Some(ConnectorInfo::FileSystem(_)) => "no directory",
        None if configured => "pending",
        None => "not configured",
    }
}

fn describe_date(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string())
}
