//! Stride IPC - Message channel between the background and foreground
//!
//! The background (sync engine) and the foreground (presentation) share no
//! state. Everything crosses the boundary as length-prefixed frames over a
//! byte stream: an in-process pipe (`IpcChannel::pair`) or a Unix socket
//! (`IpcServer` / `connect`).
//!
//! - **Requests** are correlated to replies by id and time out locally
//! - **Pushes** are fire-and-forget notifications (SYNC_EVENT)
//! - **Router** dispatches incoming messages to a `MessageHandler`;
//!   unknown flags get an "unknown message" reply
//! - **EventSubscribers** republish pushed events to local observers
//!
//! # Architecture
//!
//! ```text
//! foreground                                   background
//! ┌───────────────┐  Request{id, flag}   ┌───────────────┐
//! │ IpcChannel    │ ───────────────────► │ IpcChannel    │
//! │               │ ◄─────────────────── │   Router      │
//! │   Router      │  Reply{id}           │   Handler     │
//! │   Handler ──► │ ◄─────────────────── │               │
//! │ Subscribers   │  Push{SYNC_EVENT}    │               │
//! └───────────────┘                      └───────────────┘
//! ```
//!
//! **Note:** The socket transport only compiles on Unix platforms.

mod channel;
mod error;
pub mod router;
pub mod subscriber;
pub mod transport;
#[cfg(unix)]
pub mod unix;

pub use channel::{ChannelConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT, IpcChannel};
pub use error::{IpcError, Result};
pub use router::{
    HandlerError, MessageHandler, NoopHandler, Router, decode_payload, encode_payload,
};
pub use subscriber::{EventFilter, EventSubscribers, Subscriber, TerminalEvents};
pub use transport::{FrameReader, FrameWriter};
#[cfg(unix)]
pub use unix::{DEFAULT_SOCKET_PATH, IpcServer, connect};
