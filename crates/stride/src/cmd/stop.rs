//! Stop command - Stop a pass running on `stride serve`

use anyhow::{Context, Result};
use clap::Args;

use stride_config::Config;
use stride_protocol::ConnectorType;

use crate::engine::Session;

/// Stop command arguments
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Connector whose pass to stop (remote, file)
    #[arg(value_name = "CONNECTOR")]
    pub connector: ConnectorType,
}

/// Run the stop command
///
/// An in-process engine has no pass to stop, so this always connects.
pub async fn run(args: StopArgs, config: &Config) -> Result<()> {
    let session = Session::open(config, true).await?;
    let result = session.client().stop_sync(args.connector).await;
    session.close().await;

    result.with_context(|| format!("failed to stop {} sync", args.connector))?;
    println!("stop requested for {} sync", args.connector);
    Ok(())
}
