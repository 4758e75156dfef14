//! Connector identity and user-configured connection parameters

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Source a connector pulls activities from
///
/// NOTE: The serialized names are part of the stored sync state and the
/// envelope payloads; do not rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    /// Remote fitness-tracking API
    Remote,
    /// Local directory of activity files
    File,
}

impl ConnectorType {
    /// All connector types, in a stable order
    pub const ALL: [ConnectorType; 2] = [ConnectorType::Remote, ConnectorType::File];

    /// Get the string name of this connector type
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::File => "file",
        }
    }
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConnectorType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "file" | "filesystem" | "fs" => Ok(Self::File),
            other => Err(ProtocolError::UnknownConnectorType(other.to_string())),
        }
    }
}

/// Last successful sync marker for one connector type
///
/// One row per connector type; `connector_type` is the unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorSyncDateTime {
    pub connector_type: ConnectorType,
    /// Epoch milliseconds
    pub synced_at: i64,
}

impl ConnectorSyncDateTime {
    /// Create a marker from a timestamp
    pub fn new(connector_type: ConnectorType, at: DateTime<Utc>) -> Self {
        Self {
            connector_type,
            synced_at: at.timestamp_millis(),
        }
    }

    /// The marker as a UTC timestamp
    pub fn date_time(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.synced_at)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// Connection parameters of the remote API connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConnectorInfo {
    /// OAuth client id (needed to refresh tokens)
    pub client_id: Option<String>,
    /// OAuth client secret (needed to refresh tokens)
    pub client_secret: Option<String>,
    /// Bearer token used for API calls
    pub access_token: Option<String>,
    /// Token used to obtain a new access token once expired
    pub refresh_token: Option<String>,
    /// Access token expiry (epoch seconds)
    pub expires_at: Option<i64>,
    /// API base URL
    pub api_url: String,
    /// Activities per listing page
    pub per_page: u32,
    /// Fetch per-activity streams (one extra call per activity)
    pub fetch_streams: bool,
}

impl Default for RemoteConnectorInfo {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            access_token: None,
            refresh_token: None,
            expires_at: None,
            api_url: "https://www.strava.com/api/v3".to_string(),
            per_page: 50,
            fetch_streams: true,
        }
    }
}

impl RemoteConnectorInfo {
    /// Whether an access token is present
    pub fn is_linked(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether the access token is expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now.timestamp())
    }

    /// Whether enough is known to refresh the access token
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// Connection parameters of the file-system connector
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSystemConnectorInfo {
    /// Directory scanned for activity files
    pub source_directory: Option<PathBuf>,
    /// Descend into sub directories
    pub scan_sub_directories: bool,
    /// Extract `.zip` / `.gz` archives before scanning
    pub extract_archive_files: bool,
    /// Remove archives once extracted
    pub delete_archives_after_extract: bool,
}

impl FileSystemConnectorInfo {
    /// Create info for a source directory with archive extraction disabled
    pub fn new(source_directory: impl Into<PathBuf>) -> Self {
        Self {
            source_directory: Some(source_directory.into()),
            ..Default::default()
        }
    }

    /// Normalize dependent options
    ///
    /// Archives are never deleted when they are not extracted.
    pub fn normalized(mut self) -> Self {
        if !self.extract_archive_files {
            self.delete_archives_after_extract = false;
        }
        self
    }
}

/// User-configured parameters for one connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectorInfo {
    Remote(RemoteConnectorInfo),
    #[serde(rename = "file")]
    FileSystem(FileSystemConnectorInfo),
}

impl ConnectorInfo {
    /// Connector type these parameters belong to
    pub fn connector_type(&self) -> ConnectorType {
        match self {
            Self::Remote(_) => ConnectorType::Remote,
            Self::FileSystem(_) => ConnectorType::File,
        }
    }
}
