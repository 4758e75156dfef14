//! Tests for sync state stores

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use stride_protocol::{ConnectorSyncDateTime, ConnectorType};

use super::*;
use crate::error::StoreError;

fn marker(connector_type: ConnectorType, day: u32) -> ConnectorSyncDateTime {
    ConnectorSyncDateTime::new(
        connector_type,
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
    )
}

async fn exercise(store: &dyn SyncStateStore) {
    assert_eq!(store.get(ConnectorType::File).await.unwrap(), None);

    store.upsert(marker(ConnectorType::File, 1)).await.unwrap();
    store.upsert(marker(ConnectorType::Remote, 2)).await.unwrap();
    store.upsert(marker(ConnectorType::File, 3)).await.unwrap();

    assert_eq!(
        store.get(ConnectorType::File).await.unwrap(),
        Some(marker(ConnectorType::File, 3))
    );

    let all = store.list().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].connector_type, ConnectorType::Remote);

    assert!(store.clear(ConnectorType::File).await.unwrap());
    assert!(!store.clear(ConnectorType::File).await.unwrap());
    assert_eq!(store.get(ConnectorType::File).await.unwrap(), None);
}

#[tokio::test]
async fn test_memory_store_contract() {
    exercise(&MemorySyncStateStore::new()).await;
}

#[tokio::test]
async fn test_json_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    exercise(&JsonSyncStateStore::new(dir.path().join("sync_state.json"))).await;
}

#[tokio::test]
async fn test_json_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sync_state.json");

    JsonSyncStateStore::new(&path)
        .upsert(marker(ConnectorType::Remote, 5))
        .await
        .unwrap();

    let reopened = JsonSyncStateStore::new(&path);
    assert_eq!(
        reopened.get(ConnectorType::Remote).await.unwrap(),
        Some(marker(ConnectorType::Remote, 5))
    );
}

#[tokio::test]
async fn test_json_store_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sync_state.json");
    tokio::fs::write(&path, "[{").await.unwrap();

    let store = JsonSyncStateStore::new(&path);
    assert!(matches!(
        store.get(ConnectorType::File).await,
        Err(StoreError::Corrupt { .. })
    ));
}

#[tokio::test]
async fn test_json_store_concurrent_upserts_keep_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonSyncStateStore::new(dir.path().join("sync_state.json")));

    let mut handles = Vec::new();
    for (i, connector_type) in ConnectorType::ALL.into_iter().enumerate() {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.upsert(marker(connector_type, i as u32 + 1)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.list().await.unwrap().len(), ConnectorType::ALL.len());
}
