//! Protocol error types
//!
//! Errors raised while decoding envelopes. These are local failures of the
//! receiving side, distinct from the `{success, error}` replies exchanged
//! between the two contexts.

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame is too short to contain required fields
    #[error("frame truncated: {0}")]
    Truncated(&'static str),

    /// Frame kind byte is not one of request/reply/push
    #[error("unknown frame kind: {0}")]
    UnknownFrameKind(u8),

    /// Frame exceeds the maximum size
    #[error("frame size {size} exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Empty frame
    #[error("empty frame")]
    EmptyFrame,

    /// Payload is not valid JSON
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// String field is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Unrecognized connector type name
    #[error("unknown connector type: {0}")]
    UnknownConnectorType(String),
}

impl ProtocolError {
    /// Create a frame too large error
    #[inline]
    pub fn too_large(size: usize) -> Self {
        Self::FrameTooLarge {
            size,
            max: crate::MAX_FRAME_SIZE,
        }
    }
}
