//! Serve command - Run the background engine on a Unix socket
//!
//! # Usage
//!
//! ```bash
//! stride serve                         # socket from [ipc] socket_path
//! stride serve --socket /run/stride.sock
//! ```
//!
//! Foregrounds connect with `--connect`. Ctrl-C stops running passes and
//! removes the socket.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use stride_config::Config;
use stride_ipc::IpcServer;

use crate::engine::{Engine, channel_config};

/// How long running passes get to wind down on shutdown
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Serve command arguments
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path (overrides the config)
    #[arg(long)]
    pub socket: Option<PathBuf>,
}

/// Run the serve command
pub async fn run(args: ServeArgs, config: &Config) -> Result<()> {
    let engine = Engine::open(config).await?;
    let socket_path = args.socket.unwrap_or_else(|| config.ipc.socket_path.clone());

    let server = IpcServer::new(
        socket_path.clone(),
        Arc::new(engine.background()),
        channel_config(&config.ipc),
    );
    let mut handle = server.spawn();
    println!("serving on {} (Ctrl-C to stop)", socket_path.display());

    tokio::select! {
        result = &mut handle => {
            result
                .context("ipc server task failed")?
                .with_context(|| format!("ipc server on {} failed", socket_path.display()))?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("shutdown requested");
            handle.abort();
        }
    }

    let orchestrator = engine.orchestrator();
    for connector_type in orchestrator.running() {
        if let Err(e) = orchestrator.stop_sync(connector_type) {
            warn!(connector = %connector_type, error = %e, "failed to stop sync");
        }
    }
    let deadline = tokio::time::Instant::now() + STOP_GRACE;
    while !orchestrator.running().is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    if socket_path.exists()
        && let Err(e) = std::fs::remove_file(&socket_path)
    {
        warn!(path = %socket_path.display(), error = %e, "failed to remove socket");
    }
    println!("stopped");
    Ok(())
}
