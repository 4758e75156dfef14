//! Stride Protocol - Core types shared by the background and foreground
//!
//! This crate provides the types that cross the process boundary:
//! - `SyncedActivity` / `ActivityStreams` - normalized activity records
//! - `ConnectorType` / `ConnectorInfo` - connector identity and user settings
//! - `ConnectorSyncDateTime` - per-connector last sync marker
//! - `SyncEvent` - progress and result notifications of a sync pass
//! - `MessageFlag` / `FlaggedMessage` / `Frame` - the envelope wire format
//!
//! # Design Principles
//!
//! - **By value**: everything is `Clone + Serialize`, nothing is shared
//! - **Closed flags, open wire**: unknown flag values decode fine and are
//!   classified by the receiver, never rejected by the codec
//! - **JSON payloads**: envelope payloads are opaque JSON documents framed
//!   by a small length-prefixed binary header

mod activity;
mod connector;
mod error;
mod event;
mod flag;
mod frame;

pub use activity::{ActivityKey, ActivityKind, ActivityStreams, SyncedActivity};
pub use connector::{
    ConnectorInfo, ConnectorSyncDateTime, ConnectorType, FileSystemConnectorInfo,
    RemoteConnectorInfo,
};
pub use error::ProtocolError;
pub use event::{ErrorCode, RuntimeInfo, SyncErrorInfo, SyncEvent, SyncEventKind};
pub use flag::MessageFlag;
pub use frame::{FlaggedMessage, Frame, Reply, read_length_prefix};

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Length prefix size in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Maximum encoded frame size (16MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[cfg(test)]
mod error_test;
#[cfg(test)]
mod frame_test;
