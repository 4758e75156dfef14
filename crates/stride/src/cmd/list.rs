//! List command - Activities of the foreground library

use anyhow::{Context, Result};
use clap::Args;

use stride_config::Config;
use stride_protocol::ConnectorType;
use stride_store::{ActivityStore, JsonActivityStore};

use crate::output::activity_row;

/// List command arguments
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only activities of this connector (remote, file)
    #[arg(value_name = "CONNECTOR")]
    pub connector: Option<ConnectorType>,

    /// Show only the N most recent activities
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the list command
pub async fn run(args: ListArgs, config: &Config) -> Result<()> {
    let path = config.sync.library_path();
    let library = JsonActivityStore::open(&path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut activities = library.list(args.connector).await?;
    if let Some(limit) = args.limit {
        let skip = activities.len().saturating_sub(limit);
        activities.drain(..skip);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&activities)?);
        return Ok(());
    }

    for activity in &activities {
        println!("{:<7} {}", activity.connector_type(), activity_row(activity));
    }
    if activities.is_empty() {
        println!("no activities");
    }
    Ok(())
}
