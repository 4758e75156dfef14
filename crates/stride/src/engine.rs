//! Building the background and foreground from configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use stride_config::{Config, IpcConfig, SyncPolicy};
use stride_connectors::{ResilienceConfig, parse_connector};
use stride_desktop::{
    BackgroundService, DesktopClient, ForegroundService, LocalRuntime, StreamSummaryComputer,
};
use stride_ipc::{ChannelConfig, EventSubscribers};
use stride_protocol::ConnectorInfo;
use stride_store::{
    ConnectorInfoStore, JsonActivityStore, JsonConnectorInfoStore, JsonSyncStateStore,
};
use stride_sync::{DefaultConnectorFactory, OrchestratorConfig, SyncOrchestrator, SyncStatePolicy};

/// Config files looked up when `--config` is not given
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["stride.toml", "configs/stride.toml"];

/// Load the configuration
///
/// An explicit path must exist; otherwise the default paths are tried and
/// the built-in defaults used when none exists.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()));
    }

    for candidate in DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from) {
        if candidate.exists() {
            return Config::from_file(&candidate).with_context(|| {
                format!("failed to load configuration from {}", candidate.display())
            });
        }
    }

    Ok(Config::default())
}

pub fn channel_config(ipc: &IpcConfig) -> ChannelConfig {
    ChannelConfig {
        request_timeout: ipc.request_timeout,
        queue_capacity: ipc.queue_capacity,
    }
}

fn orchestrator_config(config: &Config) -> OrchestratorConfig {
    OrchestratorConfig {
        policy: match config.sync.policy {
            SyncPolicy::Completion => SyncStatePolicy::Completion,
            SyncPolicy::PerBatch => SyncStatePolicy::PerBatch,
        },
        event_buffer: config.sync.event_buffer,
    }
}

/// Write the connector tables of the config into the info store
///
/// File-system parameters always follow the config. Remote credentials
/// stored by a previous LINK or token refresh are kept unless the config
/// carries an access token of its own.
///
/// Returns the resilience settings of the remote connector, if configured.
pub async fn seed_connector_infos(
    config: &Config,
    infos: &dyn ConnectorInfoStore,
) -> Result<Option<ResilienceConfig>> {
    let mut resilience = None;

    for (name, connector_type, raw) in config.connectors.enabled() {
        let (info, connector_resilience) = parse_connector(connector_type.as_str(), &raw.config)
            .with_context(|| format!("invalid connector '{}'", name))?;
        if connector_resilience.is_some() {
            resilience = connector_resilience;
        }

        if let ConnectorInfo::Remote(configured) = &info
            && !configured.is_linked()
            && let Some(ConnectorInfo::Remote(stored)) = infos.get(connector_type).await?
            && stored.is_linked()
        {
            debug!(connector = %name, "keeping stored remote credentials");
            continue;
        }

        infos
            .save(info)
            .await
            .with_context(|| format!("failed to store connector '{}'", name))?;
        debug!(connector = %name, connector_type = %connector_type, "connector configured");
    }

    Ok(resilience)
}

/// The background engine
pub struct Engine {
    orchestrator: SyncOrchestrator,
}

impl Engine {
    pub async fn open(config: &Config) -> Result<Self> {
        let infos = Arc::new(JsonConnectorInfoStore::new(config.sync.connector_info_path()));
        let resilience = seed_connector_infos(config, infos.as_ref())
            .await?
            .unwrap_or_default();

        let activity_path = config.sync.activity_path();
        let activities = JsonActivityStore::open(&activity_path)
            .await
            .with_context(|| format!("failed to open {}", activity_path.display()))?;
        let sync_state = JsonSyncStateStore::new(config.sync.state_path());

        let orchestrator = SyncOrchestrator::new(
            Arc::new(DefaultConnectorFactory::new(infos, resilience)),
            Arc::new(sync_state),
            Arc::new(activities),
            orchestrator_config(config),
        );

        info!(
            data_dir = %config.sync.data_dir.display(),
            policy = ?config.sync.policy,
            "engine ready"
        );
        Ok(Self { orchestrator })
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    pub fn background(&self) -> BackgroundService {
        BackgroundService::new(self.orchestrator.clone(), Arc::new(StreamSummaryComputer))
    }
}

/// Open the foreground activity database
pub async fn foreground(config: &Config) -> Result<ForegroundService> {
    let library_path = config.sync.library_path();
    let library = JsonActivityStore::open(&library_path)
        .await
        .with_context(|| format!("failed to open {}", library_path.display()))?;
    let subscribers = EventSubscribers::new(
        config.ipc.subscriber_buffer,
        config.ipc.max_subscribers,
    );
    Ok(ForegroundService::new(
        Arc::new(library),
        Arc::new(subscribers),
    ))
}

/// A foreground connected to a background
///
/// Either both run in this process, or the background is a `stride serve`
/// reached over its socket.
pub struct Session {
    client: DesktopClient,
    local: Option<LocalRuntime>,
}

impl Session {
    pub async fn open(config: &Config, connect: bool) -> Result<Self> {
        let foreground = foreground(config).await?;
        let channel_config = channel_config(&config.ipc);

        if connect {
            return Self::connect(config, foreground, channel_config).await;
        }

        let engine = Engine::open(config).await?;
        let runtime = LocalRuntime::start(engine.background(), foreground, channel_config);
        Ok(Self {
            client: runtime.client().clone(),
            local: Some(runtime),
        })
    }

    #[cfg(unix)]
    async fn connect(
        config: &Config,
        foreground: ForegroundService,
        channel_config: ChannelConfig,
    ) -> Result<Self> {
        let path = &config.ipc.socket_path;
        let subscribers = Arc::clone(foreground.subscribers());
        let channel = stride_ipc::connect(path, Arc::new(foreground), channel_config)
            .await
            .with_context(|| {
                format!(
                    "failed to connect to {} (is `stride serve` running?)",
                    path.display()
                )
            })?;
        Ok(Self {
            client: DesktopClient::new(channel, subscribers),
            local: None,
        })
    }

    #[cfg(not(unix))]
    async fn connect(_: &Config, _: ForegroundService, _: ChannelConfig) -> Result<Self> {
        anyhow::bail!("--connect requires Unix sockets")
    }

    pub fn client(&self) -> &DesktopClient {
        &self.client
    }

    pub fn is_local(&self) -> bool {
        self.local.is_some()
    }

    pub async fn close(self) {
        match self.local {
            Some(runtime) => runtime.shutdown().await,
            None => {
                let channel = self.client.channel();
                channel.close().await;
                if tokio::time::timeout(std::time::Duration::from_secs(1), channel.closed())
                    .await
                    .is_err()
                {
                    warn!("background did not close the connection");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
