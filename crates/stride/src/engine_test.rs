//! Tests for configuration loading and engine wiring

use std::path::Path;

use serde_json::json;
use stride_protocol::{ConnectorType, FileSystemConnectorInfo, RemoteConnectorInfo, SyncEventKind};
use stride_store::{ActivityStore, MemoryConnectorInfoStore};
use tempfile::TempDir;

use super::*;

fn config_with(data_dir: &Path, connectors: &str) -> Config {
    let toml = format!(
        "[sync]\ndata_dir = '{}'\n\n{}",
        data_dir.display(),
        connectors
    );
    toml.parse().unwrap()
}

fn remote_info(token: Option<&str>) -> ConnectorInfo {
    ConnectorInfo::Remote(RemoteConnectorInfo {
        access_token: token.map(String::from),
        ..Default::default()
    })
}

// =============================================================================
// load_config
// =============================================================================

#[test]
fn test_load_config_explicit_missing_path() {
    let err = load_config(Some(Path::new("/nonexistent/stride.toml"))).unwrap_err();
    assert!(err.to_string().contains("config file not found"));
}

#[test]
fn test_load_config_explicit_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stride.toml");
    std::fs::write(&path, "[log]\nlevel = \"debug\"\n[sync]\nevent_buffer = 8\n").unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.log.level.as_str(), "debug");
    assert_eq!(config.sync.event_buffer, 8);
}

#[test]
fn test_load_config_invalid_file_has_context() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stride.toml");
    std::fs::write(&path, "[sync]\nevent_buffer = 0\n").unwrap();

    let err = load_config(Some(&path)).unwrap_err();
    assert!(format!("{:#}", err).contains("failed to load configuration"));
}

#[test]
fn test_orchestrator_config_follows_policy() {
    let config: Config = "[sync]\npolicy = \"per_batch\"\nevent_buffer = 4".parse().unwrap();
    let mapped = orchestrator_config(&config);
    assert_eq!(mapped.policy, SyncStatePolicy::PerBatch);
    assert_eq!(mapped.event_buffer, 4);
}

// =============================================================================
// seed_connector_infos
// =============================================================================

#[tokio::test]
async fn test_seed_saves_file_connector() {
    let dir = TempDir::new().unwrap();
    let config = config_with(
        dir.path(),
        "[connectors.archive]\ntype = \"file\"\nsource_directory = \"/activities\"\n",
    );
    let infos = MemoryConnectorInfoStore::new();

    let resilience = seed_connector_infos(&config, &infos).await.unwrap();
    assert!(resilience.is_none());
    assert_eq!(
        infos.get(ConnectorType::File).await.unwrap(),
        Some(ConnectorInfo::FileSystem(FileSystemConnectorInfo::new(
            "/activities"
        )))
    );
}

#[tokio::test]
async fn test_seed_keeps_linked_remote_without_configured_token() {
    let dir = TempDir::new().unwrap();
    let config = config_with(
        dir.path(),
        "[connectors.strava]\ntype = \"remote\"\nmax_retries = 7\n",
    );
    let infos = MemoryConnectorInfoStore::with_infos([remote_info(Some("linked"))]);

    let resilience = seed_connector_infos(&config, &infos).await.unwrap().unwrap();
    assert_eq!(resilience.max_retries, 7);
    assert_eq!(
        infos.get(ConnectorType::Remote).await.unwrap(),
        Some(remote_info(Some("linked")))
    );
}

#[tokio::test]
async fn test_seed_configured_token_wins() {
    let dir = TempDir::new().unwrap();
    let config = config_with(
        dir.path(),
        "[connectors.strava]\ntype = \"remote\"\naccess_token = \"from-config\"\n",
    );
    let infos = MemoryConnectorInfoStore::with_infos([remote_info(Some("linked"))]);

    seed_connector_infos(&config, &infos).await.unwrap();
    assert_eq!(
        infos.get(ConnectorType::Remote).await.unwrap(),
        Some(remote_info(Some("from-config")))
    );
}

#[tokio::test]
async fn test_seed_skips_disabled_connectors() {
    let dir = TempDir::new().unwrap();
    let config = config_with(
        dir.path(),
        "[connectors.archive]\ntype = \"file\"\nenabled = false\nsource_directory = \"/a\"\n",
    );
    let infos = MemoryConnectorInfoStore::new();

    seed_connector_infos(&config, &infos).await.unwrap();
    assert_eq!(infos.get(ConnectorType::File).await.unwrap(), None);
}

// =============================================================================
// Session
// =============================================================================

#[tokio::test]
async fn test_local_session_syncs_into_both_databases() {
    let data = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let doc = json!({
        "id": "run-1",
        "name": "Lunch Run",
        "type": "Run",
        "start_time": "2024-05-01T12:00:00Z",
        "duration": 1500,
        "distance": 5000.0
    });
    std::fs::write(
        source.path().join("lunch.json"),
        serde_json::to_vec(&doc).unwrap(),
    )
    .unwrap();

    let config = config_with(
        data.path(),
        &format!(
            "[connectors.archive]\ntype = \"file\"\nsource_directory = '{}'\n",
            source.path().display()
        ),
    );

    let session = Session::open(&config, false).await.unwrap();
    assert!(session.is_local());

    let mut computed = 0;
    let terminal = session
        .client()
        .sync_and_wait(ConnectorType::File, false, false, |event| {
            if matches!(event.kind, SyncEventKind::ActivityComputed { .. }) {
                computed += 1;
            }
        })
        .await
        .unwrap();
    assert_eq!(terminal.kind, SyncEventKind::Stopped { cancelled: false });
    assert_eq!(computed, 1);

    let info = session.client().runtime_info().await.unwrap();
    assert!(info.running_syncs.is_empty());
    session.close().await;

    let library = JsonActivityStore::open(config.sync.library_path()).await.unwrap();
    let stored = library.list(Some(ConnectorType::File)).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "Lunch Run");

    let engine_db = JsonActivityStore::open(config.sync.activity_path()).await.unwrap();
    assert_eq!(engine_db.list(None).await.unwrap().len(), 1);

    // The engine recorded the pass
    let engine = Engine::open(&config).await.unwrap();
    assert!(
        engine
            .orchestrator()
            .last_sync(ConnectorType::File)
            .await
            .unwrap()
            .is_some()
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_connect_without_server_fails() {
    let data = TempDir::new().unwrap();
    let mut config = config_with(data.path(), "");
    config.ipc.socket_path = data.path().join("missing.sock");

    let err = Session::open(&config, true).await.err().unwrap();
    assert!(format!("{:#}", err).contains("stride serve"));
}
