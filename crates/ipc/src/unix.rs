//! Unix socket transport
//!
//! `IpcServer` accepts foreground connections for a background service that
//! runs as its own process; `connect` opens the foreground side.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tracing::{error, info};

use crate::channel::{ChannelConfig, IpcChannel};
use crate::error::Result;
use crate::router::MessageHandler;

/// Default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/stride.sock";

/// Accepts channel connections on a Unix socket
pub struct IpcServer {
    socket_path: PathBuf,
    handler: Arc<dyn MessageHandler>,
    config: ChannelConfig,
}

impl IpcServer {
    /// Create a server; every connection is served by `handler`
    pub fn new(
        socket_path: impl Into<PathBuf>,
        handler: Arc<dyn MessageHandler>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            handler,
            config,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind and accept connections until the task is dropped
    pub async fn run(&self) -> Result<()> {
        // Remove a stale socket left by a previous run
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = %self.socket_path.display(), "ipc server listening");

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let (reader, writer) = stream.into_split();
                    let channel = IpcChannel::spawn(
                        "background",
                        reader,
                        writer,
                        Arc::clone(&self.handler),
                        self.config,
                    );
                    info!("foreground connected");

                    tokio::spawn(async move {
                        channel.closed().await;
                        info!("foreground disconnected");
                    });
                }
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                }
            }
        }
    }

    /// Start the server in a background task
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

/// Open a channel to a server listening on `socket_path`
pub async fn connect(
    socket_path: impl AsRef<Path>,
    handler: Arc<dyn MessageHandler>,
    config: ChannelConfig,
) -> Result<IpcChannel> {
    let stream = UnixStream::connect(socket_path.as_ref()).await?;
    let (reader, writer) = stream.into_split();
    Ok(IpcChannel::spawn("foreground", reader, writer, handler, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Value, json};
    use stride_protocol::MessageFlag;

    use crate::router::{HandlerError, NoopHandler};

    struct Info;

    #[async_trait]
    impl MessageHandler for Info {
        async fn handle_request(
            &self,
            flag: MessageFlag,
            _: Value,
            _: &IpcChannel,
        ) -> std::result::Result<Value, HandlerError> {
            match flag {
                MessageFlag::GetRuntimeInfo => Ok(json!({"os": "test"})),
                _ => Err(HandlerError::Unsupported),
            }
        }

        async fn handle_push(
            &self,
            _: MessageFlag,
            _: Value,
            _: &IpcChannel,
        ) -> std::result::Result<(), HandlerError> {
            Err(HandlerError::Unsupported)
        }
    }

    #[tokio::test]
    async fn test_request_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stride.sock");

        let server = IpcServer::new(&path, Arc::new(Info), ChannelConfig::default()).spawn();

        // Wait for the listener to bind
        let mut channel = None;
        for _ in 0..100 {
            match connect(&path, Arc::new(NoopHandler), ChannelConfig::default()).await {
                Ok(c) => {
                    channel = Some(c);
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
        let channel = channel.unwrap();

        let reply = channel
            .request(MessageFlag::GetRuntimeInfo, Value::Null)
            .await
            .unwrap();
        assert_eq!(reply.success, Some(json!({"os": "test"})));

        server.abort();
    }
}
