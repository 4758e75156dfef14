//! Error types for the ipc crate

use std::io;
use std::time::Duration;

use stride_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur on the channel
#[derive(Error, Debug)]
pub enum IpcError {
    /// I/O error on the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A frame could not be encoded or decoded locally
    #[error("frame decode error: {0}")]
    Decode(#[from] ProtocolError),

    /// No reply arrived in time
    ///
    /// The peer may still be processing the request.
    #[error("{flag} request timed out after {}ms", .after.as_millis())]
    Timeout { flag: String, after: Duration },

    /// The channel is closed; pending and new requests fail
    #[error("channel closed")]
    Closed,

    /// The peer answered with an error reply
    #[error("{0}")]
    Remote(String),

    /// A payload did not have the expected shape
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Maximum subscribers reached
    #[error("maximum subscribers reached ({max})")]
    MaxSubscribers { max: usize },

    /// Subscriber not found
    #[error("subscriber not found: {id}")]
    SubscriberNotFound { id: u64 },
}

/// Result type for ipc operations
pub type Result<T> = std::result::Result<T, IpcError>;
