//! Link command - Store remote API credentials
//!
//! # Usage
//!
//! ```bash
//! stride link --access-token abc --refresh-token def --expires-at 1735689600
//! stride link --access-token abc --connect   # hand them to `stride serve`
//! ```
//!
//! Fields not given on the command line come from the `remote` connector
//! table of the config, or the built-in defaults.

use anyhow::{Context, Result};
use clap::Args;

use stride_config::Config;
use stride_connectors::parse_connector;
use stride_protocol::{ConnectorInfo, ConnectorType, RemoteConnectorInfo};

use crate::cmd::ConnectArgs;
use crate::engine::Session;

/// Link command arguments
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// OAuth access token
    #[arg(long)]
    pub access_token: String,

    /// OAuth refresh token
    #[arg(long)]
    pub refresh_token: Option<String>,

    /// Access token expiry (Unix seconds)
    #[arg(long)]
    pub expires_at: Option<i64>,

    /// OAuth client id, used to refresh the token
    #[arg(long)]
    pub client_id: Option<String>,

    /// OAuth client secret, used to refresh the token
    #[arg(long)]
    pub client_secret: Option<String>,

    /// API base URL
    #[arg(long)]
    pub api_url: Option<String>,

    #[command(flatten)]
    pub target: ConnectArgs,
}

/// Run the link command
pub async fn run(args: LinkArgs, config: &Config) -> Result<()> {
    let info = apply(configured_remote(config)?, args_fields(&args));
    if !info.is_linked() {
        anyhow::bail!("access token must not be empty");
    }

    let session = Session::open(config, args.target.connect).await?;
    let linked = session.client().link_remote_connector(&info).await;
    session.close().await;
    linked.context("failed to link the remote connector")?;

    match info.expires_at {
        Some(at) => println!("remote connector linked (token expires at {})", at),
        None => println!("remote connector linked"),
    }
    Ok(())
}

fn configured_remote(config: &Config) -> Result<RemoteConnectorInfo> {
    let Some((name, raw)) = config.connectors.for_type(ConnectorType::Remote) else {
        return Ok(RemoteConnectorInfo::default());
    };
    let (info, _) = parse_connector(ConnectorType::Remote.as_str(), &raw.config)
        .with_context(|| format!("invalid connector '{}'", name))?;
    match info {
        ConnectorInfo::Remote(remote) => Ok(remote),
        ConnectorInfo::FileSystem(_) => Ok(RemoteConnectorInfo::default()),
    }
}

/// Command-line overrides
#[derive(Debug, Default)]
struct Overrides {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    client_id: Option<String>,
    client_secret: Option<String>,
    api_url: Option<String>,
}

fn args_fields(args: &LinkArgs) -> Overrides {
    Overrides {
        access_token: args.access_token.trim().to_string(),
        refresh_token: args.refresh_token.clone(),
        expires_at: args.expires_at,
        client_id: args.client_id.clone(),
        client_secret: args.client_secret.clone(),
        api_url: args.api_url.clone(),
    }
}

fn apply(mut info: RemoteConnectorInfo, overrides: Overrides) -> RemoteConnectorInfo {
    info.access_token = Some(overrides.access_token);
    // A new access token invalidates the old expiry
    info.expires_at = overrides.expires_at;
    if overrides.refresh_token.is_some() {
        info.refresh_token = overrides.refresh_token;
    }
    if overrides.client_id.is_some() {
        info.client_id = overrides.client_id;
    }
    if overrides.client_secret.is_some() {
        info.client_secret = overrides.client_secret;
    }
    if let Some(url) = overrides.api_url {
        info.api_url = url;
    }
    info
}
