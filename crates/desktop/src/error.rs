//! Desktop runtime errors

use stride_ipc::IpcError;
use stride_store::StoreError;
use stride_sync::SyncError;
use thiserror::Error;

/// Errors of the desktop services and client
#[derive(Debug, Error)]
pub enum DesktopError {
    /// Channel failure, or an error reply from the peer
    #[error(transparent)]
    Ipc(#[from] IpcError),

    /// Orchestrator refused the operation
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Local persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DesktopError {
    /// Message sent back by the peer, for error replies
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Ipc(IpcError::Remote(message)) => Some(message),
            _ => None,
        }
    }
}

/// Result type for desktop operations
pub type Result<T> = std::result::Result<T, DesktopError>;
