//! Error types for connectors

use std::io;
use std::path::PathBuf;

use stride_protocol::{ConnectorType, ErrorCode};
use thiserror::Error;

/// Errors that end a connector sync pass
///
/// Item-scoped failures are not errors at this level: they are reported as
/// `ConnectorEvent::ItemError` and the pass continues.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Failed to initialize connector (e.g., HTTP client creation failed)
    #[error("failed to initialize connector: {0}")]
    Init(String),

    /// Connector has no usable connection parameters
    #[error("{0} connector is not configured")]
    NotConfigured(ConnectorType),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Unexpected HTTP status
    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// JSON parsing failed
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response did not have the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// API rate limited
    #[error("rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Resource not found
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Source root (directory, host) missing or unreachable
    #[error("source unreachable: {0}")]
    SourceUnreachable(String),

    /// File system failure outside of a single item
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Transient failures persisted past the retry budget
    #[error("failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The event receiver went away
    #[error("event receiver closed")]
    SinkClosed,
}

impl ConnectorError {
    /// Create an I/O error bound to a path
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if the failure is transient and the request may be retried
    ///
    /// Rate limiting is not retryable here; callers pause for the
    /// server-provided delay instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Classification carried by the error event
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthFailed(_) => ErrorCode::AuthFailed,
            Self::NotConfigured(_) | Self::ConfigError(_) => ErrorCode::NotConfigured,
            Self::SourceUnreachable(_) | Self::RetriesExhausted { .. } => {
                ErrorCode::SourceUnreachable
            }
            Self::Http(e) if e.is_connect() || e.is_timeout() => ErrorCode::SourceUnreachable,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::Json(_) | Self::InvalidResponse(_) => ErrorCode::ParseFailed,
            Self::Io { .. } => ErrorCode::Io,
            _ => ErrorCode::Internal,
        }
    }
}

/// Result type for connector operations
pub type Result<T> = std::result::Result<T, ConnectorError>;
