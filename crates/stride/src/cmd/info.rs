//! Info command - Describe the background runtime

use anyhow::{Context, Result};
use clap::Args;

use stride_config::Config;

use crate::cmd::ConnectArgs;
use crate::engine::Session;

/// Info command arguments
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub target: ConnectArgs,
}

/// Run the info command
pub async fn run(args: InfoArgs, config: &Config) -> Result<()> {
    let session = Session::open(config, args.target.connect).await?;
    let local = session.is_local();
    let info = session.client().runtime_info().await;
    session.close().await;
    let info = info.context("failed to query the background")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let running = if info.running_syncs.is_empty() {
        "none".to_string()
    } else {
        info.running_syncs
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("version:  {}", info.app_version);
    println!("platform: {}/{}", info.os, info.arch);
    println!("cpus:     {}", info.cpu_count);
    println!("engine:   {}", if local { "in-process" } else { "served" });
    println!("syncing:  {}", running);
    Ok(())
}
