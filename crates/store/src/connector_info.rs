//! User-configured connector parameters, one row per connector type
//!
//! Holds what LINK_REMOTE_CONNECTOR stores and what a token refresh renews,
//! so credentials survive restarts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::debug;

use stride_protocol::{ConnectorInfo, ConnectorType};

use crate::error::Result;
use crate::json_file;

/// Persistence contract for `ConnectorInfo`
#[async_trait]
pub trait ConnectorInfoStore: Send + Sync {
    /// Get the parameters of a connector type
    async fn get(&self, connector_type: ConnectorType) -> Result<Option<ConnectorInfo>>;

    /// Insert or replace the parameters for their connector type
    async fn save(&self, info: ConnectorInfo) -> Result<()>;

    /// All parameters, ordered by connector type
    async fn list(&self) -> Result<Vec<ConnectorInfo>>;
}

/// Apply the save-time normalization rules
fn normalize(info: ConnectorInfo) -> ConnectorInfo {
    match info {
        ConnectorInfo::FileSystem(fs) => ConnectorInfo::FileSystem(fs.normalized()),
        remote => remote,
    }
}

/// In-memory connector parameters
#[derive(Debug, Default)]
pub struct MemoryConnectorInfoStore {
    rows: RwLock<BTreeMap<ConnectorType, ConnectorInfo>>,
}

impl MemoryConnectorInfoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `infos` (later entries win)
    pub fn with_infos(infos: impl IntoIterator<Item = ConnectorInfo>) -> Self {
        let rows = infos
            .into_iter()
            .map(normalize)
            .map(|info| (info.connector_type(), info))
            .collect();
        Self {
            rows: RwLock::new(rows),
        }
    }
}

#[async_trait]
impl ConnectorInfoStore for MemoryConnectorInfoStore {
    async fn get(&self, connector_type: ConnectorType) -> Result<Option<ConnectorInfo>> {
        Ok(self.rows.read().get(&connector_type).cloned())
    }

    async fn save(&self, info: ConnectorInfo) -> Result<()> {
        let info = normalize(info);
        self.rows.write().insert(info.connector_type(), info);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ConnectorInfo>> {
        Ok(self.rows.read().values().cloned().collect())
    }
}

/// File-backed connector parameters
///
/// The file holds a JSON array of tagged `ConnectorInfo` values. It may
/// contain OAuth tokens; callers choose its location accordingly.
#[derive(Debug)]
pub struct JsonConnectorInfoStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonConnectorInfoStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<ConnectorType, ConnectorInfo>> {
        let rows: Vec<ConnectorInfo> = json_file::read_or_default(&self.path).await?;
        Ok(rows.into_iter().map(|r| (r.connector_type(), r)).collect())
    }
}

#[async_trait]
impl ConnectorInfoStore for JsonConnectorInfoStore {
    async fn get(&self, connector_type: ConnectorType) -> Result<Option<ConnectorInfo>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(&connector_type))
    }

    async fn save(&self, info: ConnectorInfo) -> Result<()> {
        let _guard = self.lock.lock().await;
        let info = normalize(info);
        let connector_type = info.connector_type();

        let mut rows = self.load().await?;
        rows.insert(connector_type, info);
        let rows: Vec<_> = rows.into_values().collect();
        json_file::write_atomic(&self.path, &rows).await?;

        debug!(connector = %connector_type, path = %self.path.display(), "connector info saved");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ConnectorInfo>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_values().collect())
    }
}
