//! Stride Desktop - The two execution contexts of the desktop runtime
//!
//! - **Background** (`BackgroundService`): owns the `SyncOrchestrator`,
//!   serves START_SYNC, STOP_SYNC, LINK_REMOTE_CONNECTOR, GET_RUNTIME_INFO
//!   and COMPUTE_ACTIVITY, and pushes every sync event as SYNC_EVENT
//! - **Foreground** (`ForegroundService`): keeps the activity database fed
//!   from SYNC_EVENT pushes, answers FIND_ACTIVITY / FIND_ACTIVITY_STREAMS
//!   and republishes events to local subscribers
//! - **Client** (`DesktopClient`): typed requests from the foreground
//!
//! The contexts talk through a `stride_ipc::IpcChannel`, either in-process
//! (`LocalRuntime`) or over a Unix socket.
//!
//! # Example
//!
//! ```ignore
//! let runtime = LocalRuntime::start(background, foreground, ChannelConfig::default());
//! let last = runtime
//!     .client()
//!     .sync_and_wait(ConnectorType::File, true, false, |e| println!("{}", e.kind_name()))
//!     .await?;
//! ```

mod background;
mod client;
pub mod compute;
mod error;
mod foreground;
pub mod messages;
mod runtime;

pub use background::BackgroundService;
pub use client::DesktopClient;
pub use compute::{ActivityComputer, StreamSummaryComputer};
pub use error::{DesktopError, Result};
pub use foreground::ForegroundService;
pub use runtime::LocalRuntime;
