//! Stride Sync
//!
//! Drives connector passes and turns what they discover into persisted
//! activities and a stream of `SyncEvent`s.
//!
//! # Responsibilities
//!
//! - **Exclusivity**: at most one pass per connector type (`InFlightRegistry`)
//! - **Reconciliation**: skip unchanged records, merge changed ones, insert new
//!   ones; force sync re-emits everything
//! - **Bookkeeping**: the connector sync date advances on completion, or per
//!   batch with `SyncStatePolicy::PerBatch`
//! - **Isolation**: item and store failures are non-fatal events; only a
//!   connector failure ends a pass with `Error{fatal: true}`
//!
//! # Example
//!
//! ```ignore
//! let orchestrator = SyncOrchestrator::new(factory, sync_state, activities, Default::default());
//! let mut pass = orchestrator.run_sync(ConnectorType::File, true, false).await?;
//! while let Some(event) = pass.next().await {
//!     println!("{}", event.kind_name());
//! }
//! ```

mod error;
mod factory;
mod orchestrator;
mod registry;

pub use error::{Result, SyncError};
pub use factory::{ConnectorFactory, DefaultConnectorFactory};
pub use orchestrator::{
    DEFAULT_EVENT_BUFFER, OrchestratorConfig, SyncOrchestrator, SyncPass, SyncStatePolicy,
};
pub use registry::{InFlightRegistry, RegistryGuard};
