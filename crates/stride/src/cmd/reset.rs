//! Reset command - Forget a connector's sync date
//!
//! The next fast sync of that connector scans everything again. Stored
//! activities are kept, so unchanged records are still skipped.

use anyhow::{Context, Result};
use clap::Args;

use stride_config::Config;
use stride_protocol::ConnectorType;

use crate::engine::Engine;

/// Reset command arguments
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Connector to reset (remote, file)
    #[arg(value_name = "CONNECTOR")]
    pub connector: ConnectorType,
}

/// Run the reset command
pub async fn run(args: ResetArgs, config: &Config) -> Result<()> {
    let engine = Engine::open(config).await?;
    let cleared = engine
        .orchestrator()
        .reset(args.connector)
        .await
        .with_context(|| format!("failed to reset {}", args.connector))?;

    if cleared {
        println!("{} sync date cleared", args.connector);
    } else {
        println!("{} has no sync date", args.connector);
    }
    Ok(())
}
