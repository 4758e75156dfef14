//! Sync orchestration errors

use stride_connectors::ConnectorError;
use stride_protocol::ConnectorType;
use stride_store::StoreError;
use thiserror::Error;

/// Errors returned synchronously by the orchestrator
///
/// Failures during a pass are reported as `SyncEvent`s instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A pass for this connector type is in flight
    #[error("sync already running")]
    AlreadyRunning(ConnectorType),

    /// No pass for this connector type is in flight
    #[error("no {0} sync is running")]
    NotRunning(ConnectorType),

    /// No connection parameters are known for this connector type
    #[error("{0} connector is not configured")]
    NotConfigured(ConnectorType),

    /// Persistence failure outside a pass
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Connector could not be built
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),
}

impl SyncError {
    /// Connector type the error is about, when it has one
    pub fn connector_type(&self) -> Option<ConnectorType> {
        match self {
            Self::AlreadyRunning(t) | Self::NotRunning(t) | Self::NotConfigured(t) => Some(*t),
            Self::Store(_) | Self::Connector(_) => None,
        }
    }
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_running_message() {
        let err = SyncError::AlreadyRunning(ConnectorType::Remote);
        assert_eq!(err.to_string(), "sync already running");
        assert_eq!(err.connector_type(), Some(ConnectorType::Remote));
    }

    #[test]
    fn test_not_configured_message() {
        let err = SyncError::NotConfigured(ConnectorType::File);
        assert_eq!(err.to_string(), "file connector is not configured");
    }
}
