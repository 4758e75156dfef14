//! Last-sync bookkeeping, one row per connector type

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::debug;

use stride_protocol::{ConnectorSyncDateTime, ConnectorType};

use crate::error::Result;
use crate::json_file;

/// Persistence contract for `ConnectorSyncDateTime`
///
/// Writes for the same connector type are serialized by the implementation.
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    /// Get the marker for a connector type
    async fn get(&self, connector_type: ConnectorType) -> Result<Option<ConnectorSyncDateTime>>;

    /// Insert or replace the marker for its connector type
    async fn upsert(&self, marker: ConnectorSyncDateTime) -> Result<()>;

    /// Remove the marker for a connector type
    ///
    /// Returns whether a marker existed.
    async fn clear(&self, connector_type: ConnectorType) -> Result<bool>;

    /// All markers, ordered by connector type
    async fn list(&self) -> Result<Vec<ConnectorSyncDateTime>>;
}

/// In-memory sync state
#[derive(Debug, Default)]
pub struct MemorySyncStateStore {
    rows: RwLock<BTreeMap<ConnectorType, ConnectorSyncDateTime>>,
}

impl MemorySyncStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncStateStore for MemorySyncStateStore {
    async fn get(&self, connector_type: ConnectorType) -> Result<Option<ConnectorSyncDateTime>> {
        Ok(self.rows.read().get(&connector_type).copied())
    }

    async fn upsert(&self, marker: ConnectorSyncDateTime) -> Result<()> {
        self.rows.write().insert(marker.connector_type, marker);
        Ok(())
    }

    async fn clear(&self, connector_type: ConnectorType) -> Result<bool> {
        Ok(self.rows.write().remove(&connector_type).is_some())
    }

    async fn list(&self) -> Result<Vec<ConnectorSyncDateTime>> {
        Ok(self.rows.read().values().copied().collect())
    }
}

/// File-backed sync state
///
/// The file holds a JSON array of markers. An absent file is an empty
/// collection. Every mutation rewrites the file atomically under a single
/// async lock.
#[derive(Debug)]
pub struct JsonSyncStateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonSyncStateStore {
    /// Create a store backed by `path` (created on first write)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<ConnectorType, ConnectorSyncDateTime>> {
        let rows: Vec<ConnectorSyncDateTime> = json_file::read_or_default(&self.path).await?;
        Ok(rows.into_iter().map(|r| (r.connector_type, r)).collect())
    }

    async fn save(&self, rows: &BTreeMap<ConnectorType, ConnectorSyncDateTime>) -> Result<()> {
        let rows: Vec<_> = rows.values().copied().collect();
        json_file::write_atomic(&self.path, &rows).await
    }
}

#[async_trait]
impl SyncStateStore for JsonSyncStateStore {
    async fn get(&self, connector_type: ConnectorType) -> Result<Option<ConnectorSyncDateTime>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.get(&connector_type).copied())
    }

    async fn upsert(&self, marker: ConnectorSyncDateTime) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut rows = self.load().await?;
        rows.insert(marker.connector_type, marker);
        self.save(&rows).await?;

        debug!(
            connector = %marker.connector_type,
            synced_at = marker.synced_at,
            path = %self.path.display(),
            "sync date saved"
        );
        Ok(())
    }

    async fn clear(&self, connector_type: ConnectorType) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut rows = self.load().await?;
        let existed = rows.remove(&connector_type).is_some();
        if existed {
            self.save(&rows).await?;
        }
        Ok(existed)
    }

    async fn list(&self) -> Result<Vec<ConnectorSyncDateTime>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_values().collect())
    }
}

#[cfg(test)]
#[path = "sync_state_test.rs"]
mod tests;
