//! Connector configuration types
//!
//! Each connector defines its own config struct here.
//! Configs are parsed from raw TOML values provided by the config crate.

use std::path::PathBuf;

use serde::Deserialize;

use stride_protocol::{ConnectorInfo, ConnectorType, FileSystemConnectorInfo, RemoteConnectorInfo};

use crate::error::ConnectorError;
use crate::resilience::{
    DEFAULT_MAX_RATE_LIMIT_WAIT_SECS, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS, ResilienceConfig,
};

/// Remote API connector configuration
///
/// # Example
///
/// ```toml
/// [connectors.strava]
/// type = "remote"
/// client_id = "12345"
/// client_secret = "xxx"
/// access_token = "abc"
/// refresh_token = "def"
/// expires_at = 1717000000          # epoch seconds
/// per_page = 50                    # optional
/// fetch_streams = true             # optional
/// timeout_secs = 30                # optional, request timeout
/// max_retries = 3                  # optional, retry attempts
/// max_rate_limit_wait_secs = 900   # optional, cap on one 429 pause
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConnectorConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Access token expiry (epoch seconds)
    pub expires_at: Option<i64>,

    /// API base URL
    pub api_url: String,

    /// Activities per listing page (1..=200)
    pub per_page: u32,

    /// Fetch per-activity streams
    pub fetch_streams: bool,

    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,

    /// Maximum retry attempts for transient failures (default: 3)
    pub max_retries: u32,

    /// Upper bound for one rate-limit pause (default: 900)
    pub max_rate_limit_wait_secs: u64,
}

impl Default for RemoteConnectorConfig {
    fn default() -> Self {
        let info = RemoteConnectorInfo::default();
        Self {
            client_id: None,
            client_secret: None,
            access_token: None,
            refresh_token: None,
            expires_at: None,
            api_url: info.api_url,
            per_page: info.per_page,
            fetch_streams: info.fetch_streams,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            max_rate_limit_wait_secs: DEFAULT_MAX_RATE_LIMIT_WAIT_SECS,
        }
    }
}

impl RemoteConnectorConfig {
    /// Parse config from raw TOML value
    pub fn from_toml(value: &toml::Value) -> Result<Self, ConnectorError> {
        let config: RemoteConnectorConfig =
            value.clone().try_into().map_err(|e: toml::de::Error| {
                ConnectorError::ConfigError(format!("invalid remote connector config: {}", e))
            })?;

        if config.per_page == 0 || config.per_page > 200 {
            return Err(ConnectorError::ConfigError(format!(
                "per_page must be between 1 and 200, got {}",
                config.per_page
            )));
        }

        Ok(config)
    }

    /// Connection parameters described by this config
    pub fn info(&self) -> RemoteConnectorInfo {
        RemoteConnectorInfo {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
            api_url: self.api_url.trim_end_matches('/').to_string(),
            per_page: self.per_page,
            fetch_streams: self.fetch_streams,
        }
    }

    /// Build resilience config from these settings
    pub fn resilience_config(&self) -> ResilienceConfig {
        ResilienceConfig {
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            max_rate_limit_wait_secs: self.max_rate_limit_wait_secs,
            ..Default::default()
        }
    }
}

/// File-system connector configuration
///
/// # Example
///
/// ```toml
/// [connectors.archive]
/// type = "file"
/// source_directory = "/home/me/activities"
/// scan_sub_directories = true
/// extract_archive_files = true
/// delete_archives_after_extract = false
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConnectorConfig {
    pub source_directory: Option<PathBuf>,
    pub scan_sub_directories: bool,
    pub extract_archive_files: bool,
    pub delete_archives_after_extract: bool,
}

impl FileConnectorConfig {
    /// Parse config from raw TOML value
    pub fn from_toml(value: &toml::Value) -> Result<Self, ConnectorError> {
        let config: FileConnectorConfig =
            value.clone().try_into().map_err(|e: toml::de::Error| {
                ConnectorError::ConfigError(format!("invalid file connector config: {}", e))
            })?;

        if config
            .source_directory
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(ConnectorError::ConfigError(
                "source_directory must not be empty".to_string(),
            ));
        }

        Ok(config)
    }

    /// Connection parameters described by this config
    pub fn info(&self) -> FileSystemConnectorInfo {
        FileSystemConnectorInfo {
            source_directory: self.source_directory.clone(),
            scan_sub_directories: self.scan_sub_directories,
            extract_archive_files: self.extract_archive_files,
            delete_archives_after_extract: self.delete_archives_after_extract,
        }
        .normalized()
    }
}

/// Parse the connector-specific part of a `[connectors.<name>]` table
///
/// Returns the connection parameters and, for remote connectors, the
/// resilience settings.
pub fn parse_connector(
    connector_type: &str,
    value: &toml::Value,
) -> Result<(ConnectorInfo, Option<ResilienceConfig>), ConnectorError> {
    let parsed: ConnectorType = connector_type.parse().map_err(|_| {
        ConnectorError::ConfigError(format!("unknown connector type '{}'", connector_type))
    })?;

    match parsed {
        ConnectorType::Remote => {
            let config = RemoteConnectorConfig::from_toml(value)?;
            Ok((
                ConnectorInfo::Remote(config.info()),
                Some(config.resilience_config()),
            ))
        }
        ConnectorType::File => {
            let config = FileConnectorConfig::from_toml(value)?;
            Ok((ConnectorInfo::FileSystem(config.info()), None))
        }
    }
}
