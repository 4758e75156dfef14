//! Stride - Connectors
//!
//! Pull-based connectors that discover activities in an external source and
//! stream them, as normalized records, to the sync orchestrator.
//!
//! # Available Connectors
//!
//! - **Remote** - Paged activity listing of a remote fitness API (OAuth)
//! - **File** - Directory of JSON activity documents, with `.zip` / `.gz`
//!   archive extraction
//!
//! # Design Principles
//!
//! - **Lazy**: A pass pushes `ConnectorEvent`s into a bounded sink as it
//!   discovers records; the consumer applies backpressure
//! - **Cooperative stop**: `Connector::stop` is honoured between records
//! - **Item isolation**: A bad record is an `ItemError`, the pass goes on
//! - **Fatal errors**: Only failures of the source itself end a pass early
//!
//! # Example
//!
//! ```ignore
//! use stride_connectors::{Connector, EventSink, FileSystemConnector, SyncRequest};
//! use stride_protocol::FileSystemConnectorInfo;
//!
//! let connector = FileSystemConnector::new(FileSystemConnectorInfo::new("/data/rides"));
//! let (sink, mut events) = EventSink::channel(64);
//!
//! tokio::spawn(async move { connector.sync(SyncRequest::full(), sink).await });
//! while let Some(event) = events.recv().await {
//!     // reconcile candidates against the store
//! }
//! ```

pub mod config;
mod error;
mod filesystem;
mod remote;
pub mod resilience;
mod traits;

// Re-exports
pub use config::{FileConnectorConfig, RemoteConnectorConfig, parse_connector};
pub use error::{ConnectorError, Result};
pub use filesystem::FileSystemConnector;
pub use remote::RemoteConnector;
pub use resilience::ResilienceConfig;
pub use traits::{
    ActivityCandidate, Connector, ConnectorEvent, EventSink, StopSignal, SyncOutcome, SyncRequest,
};
