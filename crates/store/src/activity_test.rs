//! Tests for activity stores

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use stride_protocol::{
    ActivityKey, ActivityKind, ActivityStreams, ConnectorType, SyncedActivity,
};

use super::*;

fn activity(connector_type: ConnectorType, id: &str, hour: i64) -> SyncedActivity {
    let base = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    SyncedActivity {
        key: ActivityKey::new(connector_type, id),
        name: format!("Activity {id}"),
        kind: ActivityKind::Run,
        start_time: base + Duration::hours(hour),
        duration_secs: 1200,
        distance_m: Some(4000.0),
        metrics: json!({}),
        synced_at: Utc::now(),
    }
}

fn streams() -> ActivityStreams {
    ActivityStreams::new()
        .with("time", vec![0.0, 1.0, 2.0])
        .with("heartrate", vec![110.0, 120.0, 130.0])
}

async fn exercise(store: &dyn ActivityStore) {
    let first = activity(ConnectorType::File, "a", 5);
    assert!(!store.upsert(first.clone(), Some(streams())).await.unwrap());
    assert!(
        !store
            .upsert(activity(ConnectorType::File, "b", 1), None)
            .await
            .unwrap()
    );
    assert!(
        !store
            .upsert(activity(ConnectorType::Remote, "1", 3), None)
            .await
            .unwrap()
    );

    assert_eq!(store.find(&first.key).await.unwrap(), Some(first.clone()));
    assert_eq!(store.find_streams(&first.key).await.unwrap(), Some(streams()));

    // Update without streams keeps the stored ones
    let mut renamed = first.clone();
    renamed.name = "Renamed".into();
    assert!(store.upsert(renamed, None).await.unwrap());
    assert_eq!(store.find(&first.key).await.unwrap().unwrap().name, "Renamed");
    assert_eq!(store.find_streams(&first.key).await.unwrap(), Some(streams()));

    let all = store.list(None).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|a| a.key.source_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "1", "a"]);

    assert_eq!(store.list(Some(ConnectorType::File)).await.unwrap().len(), 2);

    assert_eq!(store.remove_connector(ConnectorType::File).await.unwrap(), 2);
    assert_eq!(store.remove_connector(ConnectorType::File).await.unwrap(), 0);
    assert_eq!(store.list(None).await.unwrap().len(), 1);
    assert_eq!(store.find(&first.key).await.unwrap(), None);
}

#[tokio::test]
async fn test_memory_store_contract() {
    exercise(&MemoryActivityStore::new()).await;
}

#[tokio::test]
async fn test_json_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonActivityStore::open(dir.path().join("activities.json"))
        .await
        .unwrap();
    exercise(&store).await;
}

#[tokio::test]
async fn test_json_store_reopen_keeps_streams() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activities.json");
    let stored = activity(ConnectorType::Remote, "42", 0);

    {
        let store = JsonActivityStore::open(&path).await.unwrap();
        store.upsert(stored.clone(), Some(streams())).await.unwrap();
    }

    let reopened = JsonActivityStore::open(&path).await.unwrap();
    assert_eq!(reopened.find(&stored.key).await.unwrap(), Some(stored.clone()));
    assert_eq!(reopened.find_streams(&stored.key).await.unwrap(), Some(streams()));
}

#[tokio::test]
async fn test_memory_store_seeded_from_file_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("activities.json");
    let stored = activity(ConnectorType::File, "ride.json", 2);

    let store = JsonActivityStore::open(&path).await.unwrap();
    store.upsert(stored.clone(), None).await.unwrap();

    let rows = JsonActivityStore::read_rows(&path).await.unwrap();
    let snapshot = MemoryActivityStore::from_rows(rows);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.find(&stored.key).await.unwrap(), Some(stored));
}
