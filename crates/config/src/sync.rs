//! Sync engine configuration: where state lives and how it advances

use std::path::PathBuf;

use serde::Deserialize;

/// When the connector sync date advances
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    /// Only when a pass completes (default)
    #[default]
    Completion,
    /// After every fully processed batch, so an interrupted pass resumes
    PerBatch,
}

/// Sync engine configuration
///
/// Files default to names inside `data_dir`.
///
/// # Example
///
/// ```toml
/// [sync]
/// data_dir = "~/.local/share/stride"
/// policy = "per_batch"
/// event_buffer = 64
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory holding every state file
    /// Default: "data"
    pub data_dir: PathBuf,

    /// Connector sync dates
    /// Default: `<data_dir>/sync_state.json`
    pub state_file: Option<PathBuf>,

    /// Activities known to the sync engine
    /// Default: `<data_dir>/activities.json`
    pub activity_file: Option<PathBuf>,

    /// Activity database of the foreground
    /// Default: `<data_dir>/library.json`
    pub library_file: Option<PathBuf>,

    /// Connector parameters and credentials
    /// Default: `<data_dir>/connectors.json`
    pub connector_info_file: Option<PathBuf>,

    /// Sync date policy
    pub policy: SyncPolicy,

    /// Events buffered between a pass and its observer
    /// Default: 64
    pub event_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            state_file: None,
            activity_file: None,
            library_file: None,
            connector_info_file: None,
            policy: SyncPolicy::Completion,
            event_buffer: 64,
        }
    }
}

impl SyncConfig {
    pub fn state_path(&self) -> PathBuf {
        self.resolve(&self.state_file, "sync_state.json")
    }

    pub fn activity_path(&self) -> PathBuf {
        self.resolve(&self.activity_file, "activities.json")
    }

    pub fn library_path(&self) -> PathBuf {
        self.resolve(&self.library_file, "library.json")
    }

    pub fn connector_info_path(&self) -> PathBuf {
        self.resolve(&self.connector_info_file, "connectors.json")
    }

    fn resolve(&self, explicit: &Option<PathBuf>, default_name: &str) -> PathBuf {
        explicit
            .clone()
            .unwrap_or_else(|| self.data_dir.join(default_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: SyncConfig = toml::from_str("").unwrap();
        assert_eq!(config.policy, SyncPolicy::Completion);
        assert_eq!(config.event_buffer, 64);
        assert_eq!(config.state_path(), PathBuf::from("data/sync_state.json"));
        assert_eq!(config.activity_path(), PathBuf::from("data/activities.json"));
        assert_eq!(config.library_path(), PathBuf::from("data/library.json"));
        assert_eq!(
            config.connector_info_path(),
            PathBuf::from("data/connectors.json")
        );
    }

    #[test]
    fn test_paths_follow_data_dir() {
        let config: SyncConfig = toml::from_str("data_dir = \"/var/stride\"").unwrap();
        assert_eq!(
            config.state_path(),
            PathBuf::from("/var/stride/sync_state.json")
        );
    }

    #[test]
    fn test_explicit_file_wins() {
        let toml = r#"
data_dir = "/var/stride"
state_file = "/tmp/state.json"
policy = "per_batch"
"#;
        let config: SyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.state_path(), PathBuf::from("/tmp/state.json"));
        assert_eq!(
            config.activity_path(),
            PathBuf::from("/var/stride/activities.json")
        );
        assert_eq!(config.policy, SyncPolicy::PerBatch);
    }
}
