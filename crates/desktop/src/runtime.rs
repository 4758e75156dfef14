//! In-process wiring of the two contexts

use std::sync::Arc;

use stride_ipc::{ChannelConfig, IpcChannel};

use crate::background::BackgroundService;
use crate::client::DesktopClient;
use crate::foreground::ForegroundService;

/// Background and foreground connected by an in-process pipe
///
/// The two services still share nothing: every message crosses the pipe
/// as an encoded frame, exactly as over a socket.
pub struct LocalRuntime {
    client: DesktopClient,
    background: IpcChannel,
}

impl LocalRuntime {
    pub fn start(
        background: BackgroundService,
        foreground: ForegroundService,
        config: ChannelConfig,
    ) -> Self {
        let subscribers = Arc::clone(foreground.subscribers());
        let (background, foreground) =
            IpcChannel::pair(Arc::new(background), Arc::new(foreground), config);
        Self {
            client: DesktopClient::new(foreground, subscribers),
            background,
        }
    }

    pub fn client(&self) -> &DesktopClient {
        &self.client
    }

    /// Close both directions and wait for the channels to wind down
    pub async fn shutdown(self) {
        self.client.channel().close().await;
        self.background.close().await;
        self.client.channel().closed().await;
        self.background.closed().await;
    }
}
