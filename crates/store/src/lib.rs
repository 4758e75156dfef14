//! Stride Store
//!
//! Persistence contracts used by the sync engine and the foreground.
//!
//! | Store | Key | Contains |
//! |-------|-----|----------|
//! | `SyncStateStore` | connector type | last successful sync date |
//! | `ActivityStore` | `(connector_type, source_id)` | synced activities and their streams |
//! | `ConnectorInfoStore` | connector type | connector parameters and credentials |
//!
//! Each contract has an in-memory implementation (tests, ephemeral runs) and
//! a JSON-file implementation that writes the whole collection atomically
//! (temp file + rename) on every mutation.
//!
//! # Usage
//!
//! ```ignore
//! use stride_store::{JsonSyncStateStore, SyncStateStore};
//!
//! let store = JsonSyncStateStore::new("data/sync_state.json");
//! let last = store.get(ConnectorType::File).await?;
//! ```

mod activity;
mod connector_info;
mod error;
mod json_file;
mod sync_state;

pub use activity::{ActivityStore, JsonActivityStore, MemoryActivityStore, StoredActivity};
pub use connector_info::{ConnectorInfoStore, JsonConnectorInfoStore, MemoryConnectorInfoStore};
pub use error::{Result, StoreError};
pub use sync_state::{JsonSyncStateStore, MemorySyncStateStore, SyncStateStore};
