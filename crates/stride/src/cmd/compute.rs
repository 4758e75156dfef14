//! Compute command - Recompute the derived metrics of an activity
//!
//! The background fetches the activity and its streams from the foreground
//! library, so the activity must have been synced first.

use anyhow::{Context, Result};
use clap::Args;

use stride_config::Config;
use stride_protocol::{ActivityKey, ConnectorType};

use crate::cmd::ConnectArgs;
use crate::engine::Session;

/// Compute command arguments
#[derive(Args, Debug)]
pub struct ComputeArgs {
    /// Connector the activity came from (remote, file)
    #[arg(value_name = "CONNECTOR")]
    pub connector: ConnectorType,

    /// Source id of the activity
    #[arg(value_name = "ID")]
    pub source_id: String,

    #[command(flatten)]
    pub target: ConnectArgs,
}

/// Run the compute command
pub async fn run(args: ComputeArgs, config: &Config) -> Result<()> {
    let key = ActivityKey::new(args.connector, args.source_id);
    let session = Session::open(config, args.target.connect).await?;
    let computed = session.client().compute_activity(&key).await;
    session.close().await;

    let computed = computed.with_context(|| format!("failed to compute {}", key))?;
    println!("{}", serde_json::to_string_pretty(&computed)?);
    Ok(())
}
