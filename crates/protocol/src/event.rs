//! Sync events streamed from a sync pass to observers
//!
//! Events are transient: they are transported, never persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::activity::{ActivityStreams, SyncedActivity};
use crate::connector::ConnectorType;

/// Classification of a sync error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Credentials rejected by the source
    AuthFailed,
    /// Source root (directory, API host) missing or unreachable
    SourceUnreachable,
    /// Source throttled us beyond the configured patience
    RateLimited,
    /// One record could not be parsed or validated
    ParseFailed,
    /// One archive could not be extracted
    ExtractFailed,
    /// File system failure on one item
    Io,
    /// Persisting a record failed
    Store,
    /// Connector is not configured
    NotConfigured,
    /// Anything else
    Internal,
}

impl ErrorCode {
    /// Get the string name of this code
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthFailed => "auth_failed",
            Self::SourceUnreachable => "source_unreachable",
            Self::RateLimited => "rate_limited",
            Self::ParseFailed => "parse_failed",
            Self::ExtractFailed => "extract_failed",
            Self::Io => "io",
            Self::Store => "store",
            Self::NotConfigured => "not_configured",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error payload carried by an error event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncErrorInfo {
    pub code: ErrorCode,
    pub description: String,
    /// Offending record (file path, API id) when the error is item scoped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl SyncErrorInfo {
    /// Create an error not tied to a record
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            source_id: None,
        }
    }

    /// Create an error tied to one record
    pub fn for_item(
        code: ErrorCode,
        source_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            code,
            description: description.into(),
            source_id: Some(source_id.into()),
        }
    }
}

impl fmt::Display for SyncErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_id {
            Some(id) => write!(f, "[{}] {}: {}", self.code, id, self.description),
            None => write!(f, "[{}] {}", self.code, self.description),
        }
    }
}

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEventKind {
    /// A pass began
    Started,
    /// Free-form progress ("Scanning ...", "Page 3 ...")
    GenericProgress { description: String },
    /// An activity was inserted or updated
    ActivityComputed {
        activity: SyncedActivity,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        streams: Option<ActivityStreams>,
        is_new: bool,
    },
    /// The pass ended; `cancelled` distinguishes a stop request from completion
    Stopped { cancelled: bool },
    /// An item failed (`fatal = false`) or the pass aborted (`fatal = true`)
    Error { error: SyncErrorInfo, fatal: bool },
    /// Informational notice
    GenericInfo { description: String },
}

/// A unit of progress/result information of a sync pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub connector_type: ConnectorType,
    /// Set when the event was produced by a connector sync pass
    #[serde(default)]
    pub from_connector_sync: bool,
    #[serde(flatten)]
    pub kind: SyncEventKind,
}

impl SyncEvent {
    /// Create an event produced by a sync pass
    pub fn new(connector_type: ConnectorType, kind: SyncEventKind) -> Self {
        Self {
            connector_type,
            from_connector_sync: true,
            kind,
        }
    }

    pub fn started(connector_type: ConnectorType) -> Self {
        Self::new(connector_type, SyncEventKind::Started)
    }

    pub fn progress(connector_type: ConnectorType, description: impl Into<String>) -> Self {
        Self::new(
            connector_type,
            SyncEventKind::GenericProgress {
                description: description.into(),
            },
        )
    }

    pub fn info(connector_type: ConnectorType, description: impl Into<String>) -> Self {
        Self::new(
            connector_type,
            SyncEventKind::GenericInfo {
                description: description.into(),
            },
        )
    }

    pub fn activity(
        activity: SyncedActivity,
        streams: Option<ActivityStreams>,
        is_new: bool,
    ) -> Self {
        Self::new(
            activity.connector_type(),
            SyncEventKind::ActivityComputed {
                activity,
                streams,
                is_new,
            },
        )
    }

    pub fn stopped(connector_type: ConnectorType, cancelled: bool) -> Self {
        Self::new(connector_type, SyncEventKind::Stopped { cancelled })
    }

    pub fn error(connector_type: ConnectorType, error: SyncErrorInfo, fatal: bool) -> Self {
        Self::new(connector_type, SyncEventKind::Error { error, fatal })
    }

    /// Check if no further events follow this one in its pass
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            SyncEventKind::Stopped { .. } | SyncEventKind::Error { fatal: true, .. }
        )
    }

    /// Short name of the event kind, for logs
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            SyncEventKind::Started => "started",
            SyncEventKind::GenericProgress { .. } => "progress",
            SyncEventKind::ActivityComputed { .. } => "activity",
            SyncEventKind::Stopped { .. } => "stopped",
            SyncEventKind::Error { .. } => "error",
            SyncEventKind::GenericInfo { .. } => "info",
        }
    }
}

/// Description of the background runtime, answered to GET_RUNTIME_INFO
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub app_version: String,
    pub os: String,
    pub arch: String,
    pub cpu_count: usize,
    /// Connector types with a pass currently in flight
    #[serde(default)]
    pub running_syncs: Vec<ConnectorType>,
}
