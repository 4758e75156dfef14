//! Synced activity persistence

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use stride_protocol::{ActivityKey, ActivityStreams, ConnectorType, SyncedActivity};

use crate::error::Result;
use crate::json_file;

/// An activity with its streams, as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredActivity {
    pub activity: SyncedActivity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streams: Option<ActivityStreams>,
}

/// Persistence contract for synced activities
///
/// `(connector_type, source_id)` is unique.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Find an activity by key
    async fn find(&self, key: &ActivityKey) -> Result<Option<SyncedActivity>>;

    /// Find the streams of an activity
    async fn find_streams(&self, key: &ActivityKey) -> Result<Option<ActivityStreams>>;

    /// Insert or replace an activity
    ///
    /// `streams = None` keeps any previously stored streams.
    /// Returns whether the key existed before.
    async fn upsert(
        &self,
        activity: SyncedActivity,
        streams: Option<ActivityStreams>,
    ) -> Result<bool>;

    /// List activities, optionally restricted to one connector, oldest first
    async fn list(&self, connector_type: Option<ConnectorType>) -> Result<Vec<SyncedActivity>>;

    /// Delete every activity of a connector, returning how many were removed
    async fn remove_connector(&self, connector_type: ConnectorType) -> Result<usize>;
}

type Rows = BTreeMap<ActivityKey, StoredActivity>;

fn upsert_row(rows: &mut Rows, activity: SyncedActivity, streams: Option<ActivityStreams>) -> bool {
    let key = activity.key.clone();
    match rows.get_mut(&key) {
        Some(row) => {
            row.activity = activity;
            if streams.is_some() {
                row.streams = streams;
            }
            true
        }
        None => {
            rows.insert(key, StoredActivity { activity, streams });
            false
        }
    }
}

fn list_rows(rows: &Rows, connector_type: Option<ConnectorType>) -> Vec<SyncedActivity> {
    let mut list: Vec<SyncedActivity> = rows
        .values()
        .filter(|row| connector_type.is_none_or(|t| row.activity.connector_type() == t))
        .map(|row| row.activity.clone())
        .collect();
    list.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.key.cmp(&b.key)));
    list
}

fn remove_rows(rows: &mut Rows, connector_type: ConnectorType) -> usize {
    let before = rows.len();
    rows.retain(|key, _| key.connector_type != connector_type);
    before - rows.len()
}

/// In-memory activity store
#[derive(Debug, Default)]
pub struct MemoryActivityStore {
    rows: RwLock<Rows>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from previously stored rows
    pub fn from_rows(rows: impl IntoIterator<Item = StoredActivity>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| (row.activity.key.clone(), row))
            .collect();
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Number of stored activities
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl ActivityStore for MemoryActivityStore {
    async fn find(&self, key: &ActivityKey) -> Result<Option<SyncedActivity>> {
        Ok(self.rows.read().get(key).map(|row| row.activity.clone()))
    }

    async fn find_streams(&self, key: &ActivityKey) -> Result<Option<ActivityStreams>> {
        Ok(self.rows.read().get(key).and_then(|row| row.streams.clone()))
    }

    async fn upsert(
        &self,
        activity: SyncedActivity,
        streams: Option<ActivityStreams>,
    ) -> Result<bool> {
        Ok(upsert_row(&mut self.rows.write(), activity, streams))
    }

    async fn list(&self, connector_type: Option<ConnectorType>) -> Result<Vec<SyncedActivity>> {
        Ok(list_rows(&self.rows.read(), connector_type))
    }

    async fn remove_connector(&self, connector_type: ConnectorType) -> Result<usize> {
        Ok(remove_rows(&mut self.rows.write(), connector_type))
    }
}

/// File-backed activity store
///
/// Rows are loaded once on `open` and kept in memory; every mutation
/// rewrites the file atomically.
#[derive(Debug)]
pub struct JsonActivityStore {
    path: PathBuf,
    rows: Mutex<Rows>,
}

impl JsonActivityStore {
    /// Open (or lazily create) the store at `path`
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let rows = Self::read_rows(&path).await?;

        info!(
            path = %path.display(),
            activities = rows.len(),
            "activity store opened"
        );

        Ok(Self {
            rows: Mutex::new(rows.into_iter().map(|r| (r.activity.key.clone(), r)).collect()),
            path,
        })
    }

    /// Read the stored rows without opening a store
    pub async fn read_rows(path: &Path) -> Result<Vec<StoredActivity>> {
        json_file::read_or_default(path).await
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self, rows: &Rows) -> Result<()> {
        let list: Vec<&StoredActivity> = rows.values().collect();
        json_file::write_atomic(&self.path, &list).await?;
        debug!(path = %self.path.display(), activities = list.len(), "activity store saved");
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for JsonActivityStore {
    async fn find(&self, key: &ActivityKey) -> Result<Option<SyncedActivity>> {
        Ok(self.rows.lock().await.get(key).map(|row| row.activity.clone()))
    }

    async fn find_streams(&self, key: &ActivityKey) -> Result<Option<ActivityStreams>> {
        Ok(self
            .rows
            .lock()
            .await
            .get(key)
            .and_then(|row| row.streams.clone()))
    }

    async fn upsert(
        &self,
        activity: SyncedActivity,
        streams: Option<ActivityStreams>,
    ) -> Result<bool> {
        let mut rows = self.rows.lock().await;
        let mut updated = rows.clone();
        let existed = upsert_row(&mut updated, activity, streams);
        self.save(&updated).await?;
        *rows = updated;
        Ok(existed)
    }

    async fn list(&self, connector_type: Option<ConnectorType>) -> Result<Vec<SyncedActivity>> {
        Ok(list_rows(&*self.rows.lock().await, connector_type))
    }

    async fn remove_connector(&self, connector_type: ConnectorType) -> Result<usize> {
        let mut rows = self.rows.lock().await;
        let mut updated = rows.clone();
        let removed = remove_rows(&mut updated, connector_type);
        if removed > 0 {
            self.save(&updated).await?;
            *rows = updated;
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "activity_test.rs"]
mod tests;
