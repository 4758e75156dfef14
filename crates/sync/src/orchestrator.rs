//! Sync orchestrator
//!
//! Runs one connector pass per request, reconciles every candidate against
//! the activity store and reports progress as a stream of `SyncEvent`s.
//!
//! # Event Sequence
//!
//! ```text
//! Started → (GenericProgress | GenericInfo | ActivityComputed | Error{fatal: false})*
//!         → Stopped{cancelled} | Error{fatal: true}
//! ```
//!
//! The in-flight slot is released before the terminal event is sent, so an
//! observer that reacts to the terminal event can start the next pass.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use stride_connectors::{
    ActivityCandidate, Connector, ConnectorError, ConnectorEvent, EventSink, SyncOutcome,
    SyncRequest,
};
use stride_protocol::{
    ActivityKey, ActivityStreams, ConnectorInfo, ConnectorSyncDateTime, ConnectorType, ErrorCode,
    SyncErrorInfo, SyncEvent,
};
use stride_store::{ActivityStore, SyncStateStore};

use crate::error::{Result, SyncError};
use crate::factory::ConnectorFactory;
use crate::registry::{InFlightRegistry, RegistryGuard};

/// Default capacity of the connector and observer event queues
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// When the sync date of a connector advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatePolicy {
    /// Only a pass that ran to completion advances the date (to its start)
    #[default]
    Completion,
    /// Every completed batch advances the date to the batch watermark
    PerBatch,
}

/// Orchestrator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub policy: SyncStatePolicy,
    /// Capacity of the connector and observer event queues
    pub event_buffer: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            policy: SyncStatePolicy::default(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Coordinates sync passes across connector types
///
/// Cheap to clone; clones share the registry and stores.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    factory: Arc<dyn ConnectorFactory>,
    sync_state: Arc<dyn SyncStateStore>,
    activities: Arc<dyn ActivityStore>,
    registry: InFlightRegistry,
    config: OrchestratorConfig,
}

/// Event stream of a running pass
///
/// Dropping it does not stop the pass; events sent afterwards are discarded.
pub struct SyncPass {
    connector_type: ConnectorType,
    events: mpsc::Receiver<SyncEvent>,
}

impl SyncPass {
    pub fn connector_type(&self) -> ConnectorType {
        self.connector_type
    }

    /// Next event, `None` once the terminal event has been received
    pub async fn next(&mut self) -> Option<SyncEvent> {
        self.events.recv().await
    }

    /// Drain every remaining event
    pub async fn collect(mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        events
    }
}

/// Counters of one pass, for logs
#[derive(Debug, Default)]
struct PassStats {
    inserted: u64,
    updated: u64,
    skipped: u64,
    errors: u64,
}

impl SyncOrchestrator {
    pub fn new(
        factory: Arc<dyn ConnectorFactory>,
        sync_state: Arc<dyn SyncStateStore>,
        activities: Arc<dyn ActivityStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                factory,
                sync_state,
                activities,
                registry: InFlightRegistry::new(),
                config,
            }),
        }
    }

    /// Start a pass for `connector_type`
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` when a pass of that type is in flight; nothing is
    /// started or modified in that case.
    pub async fn run_sync(
        &self,
        connector_type: ConnectorType,
        fast_sync: bool,
        force_sync: bool,
    ) -> Result<SyncPass> {
        if self.inner.registry.is_running(connector_type) {
            return Err(SyncError::AlreadyRunning(connector_type));
        }

        let connector = self.inner.factory.create(connector_type).await?;
        let guard = self
            .inner
            .registry
            .try_register(connector_type, Arc::clone(&connector))
            .ok_or(SyncError::AlreadyRunning(connector_type))?;

        let started_at = Utc::now();
        let last_sync = self
            .inner
            .sync_state
            .get(connector_type)
            .await?
            .map(|m| m.date_time())
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        let request = SyncRequest {
            fast_sync,
            force_sync,
            last_sync,
        };

        info!(
            connector = %connector_type,
            fast_sync,
            force_sync,
            last_sync = %last_sync,
            "starting sync pass"
        );

        let (sender, events) = mpsc::channel(self.inner.config.event_buffer);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let pass = Pass {
                inner: &inner,
                connector_type,
                request,
                started_at,
                sender,
                stats: PassStats::default(),
                watermark: last_sync,
            };
            pass.run(connector, guard).await;
        });

        Ok(SyncPass {
            connector_type,
            events,
        })
    }

    /// Ask the running pass of `connector_type` to stop
    ///
    /// The pass ends with `Stopped{cancelled: true}` at its next checkpoint.
    pub fn stop_sync(&self, connector_type: ConnectorType) -> Result<()> {
        if self.inner.registry.stop(connector_type) {
            info!(connector = %connector_type, "stop requested");
            Ok(())
        } else {
            Err(SyncError::NotRunning(connector_type))
        }
    }

    pub fn is_running(&self, connector_type: ConnectorType) -> bool {
        self.inner.registry.is_running(connector_type)
    }

    /// Connector types with a pass in flight
    pub fn running(&self) -> Vec<ConnectorType> {
        self.inner.registry.running()
    }

    /// Forget the sync date of `connector_type`, so the next fast sync is full
    ///
    /// Returns whether a date was recorded. Refused while a pass is running.
    pub async fn reset(&self, connector_type: ConnectorType) -> Result<bool> {
        if self.is_running(connector_type) {
            return Err(SyncError::AlreadyRunning(connector_type));
        }
        let cleared = self.inner.sync_state.clear(connector_type).await?;
        info!(connector = %connector_type, cleared, "sync date reset");
        Ok(cleared)
    }

    /// Last successful sync date of `connector_type`
    pub async fn last_sync(&self, connector_type: ConnectorType) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .inner
            .sync_state
            .get(connector_type)
            .await?
            .map(|m| m.date_time()))
    }

    /// Store connector parameters used by the next pass
    pub async fn save_connector_info(&self, info: ConnectorInfo) -> Result<()> {
        self.inner.factory.save_info(info).await
    }
}

/// State of one pass, owned by its task
struct Pass<'a> {
    inner: &'a Inner,
    connector_type: ConnectorType,
    request: SyncRequest,
    started_at: DateTime<Utc>,
    sender: mpsc::Sender<SyncEvent>,
    stats: PassStats,
    /// Newest sync date written by this pass (per-batch policy)
    watermark: DateTime<Utc>,
}

impl Pass<'_> {
    async fn run(mut self, connector: Arc<dyn Connector>, guard: RegistryGuard) {
        self.emit(SyncEvent::started(self.connector_type)).await;

        let (sink, mut source) = EventSink::channel(self.inner.config.event_buffer);
        let request = self.request;
        let producer = tokio::spawn(async move { connector.sync(request, sink).await });

        while let Some(event) = source.recv().await {
            self.handle(event).await;
        }

        let terminal = match producer.await {
            Ok(Ok(SyncOutcome::Completed)) => {
                self.record_completion().await;
                SyncEvent::stopped(self.connector_type, false)
            }
            Ok(Ok(SyncOutcome::Stopped)) => {
                info!(connector = %self.connector_type, "sync pass cancelled");
                SyncEvent::stopped(self.connector_type, true)
            }
            Ok(Err(e)) => {
                error!(connector = %self.connector_type, error = %e, "sync pass failed");
                SyncEvent::error(self.connector_type, fatal_info(&e), true)
            }
            Err(e) => {
                error!(connector = %self.connector_type, error = %e, "connector task failed");
                SyncEvent::error(
                    self.connector_type,
                    SyncErrorInfo::new(
                        ErrorCode::Internal,
                        format!("connector task failed: {}", e),
                    ),
                    true,
                )
            }
        };

        info!(
            connector = %self.connector_type,
            outcome = terminal.kind_name(),
            inserted = self.stats.inserted,
            updated = self.stats.updated,
            skipped = self.stats.skipped,
            errors = self.stats.errors,
            "sync pass finished"
        );

        drop(guard);
        self.emit(terminal).await;
    }

    /// Forward an event to the observer
    ///
    /// A dropped observer does not abort the pass: records are still stored.
    async fn emit(&self, event: SyncEvent) {
        if self.sender.send(event).await.is_err() {
            debug!(connector = %self.connector_type, "sync observer gone, event dropped");
        }
    }

    async fn emit_error(&mut self, error: SyncErrorInfo) {
        self.stats.errors += 1;
        self.emit(SyncEvent::error(self.connector_type, error, false))
            .await;
    }

    async fn handle(&mut self, event: ConnectorEvent) {
        match event {
            ConnectorEvent::Candidate(candidate) => self.reconcile(candidate).await,
            ConnectorEvent::Progress(description) => {
                self.emit(SyncEvent::progress(self.connector_type, description))
                    .await
            }
            ConnectorEvent::Info(description) => {
                self.emit(SyncEvent::info(self.connector_type, description))
                    .await
            }
            ConnectorEvent::ItemError(error) => self.emit_error(error).await,
            ConnectorEvent::BatchCompleted { watermark } => self.record_batch(watermark).await,
            ConnectorEvent::CredentialsRefreshed(info) => {
                let saved = self
                    .inner
                    .factory
                    .save_info(ConnectorInfo::Remote(info))
                    .await;
                if let Err(e) = saved {
                    warn!(
                        connector = %self.connector_type,
                        error = %e,
                        "failed to save refreshed credentials"
                    );
                    self.emit_error(SyncErrorInfo::new(
                        ErrorCode::Store,
                        format!("failed to save refreshed credentials: {}", e),
                    ))
                    .await;
                }
            }
        }
    }

    /// Dedup, merge and persist one candidate
    async fn reconcile(&mut self, candidate: ActivityCandidate) {
        let ActivityCandidate { activity, streams } = candidate;
        let key = activity.key.clone();
        let store = &self.inner.activities;

        let existing = match store.find(&key).await {
            Ok(existing) => existing,
            Err(e) => {
                self.emit_error(store_item_error(&key, &e.to_string()))
                    .await;
                return;
            }
        };

        let record = match existing {
            None => activity,
            Some(current) => {
                if !self.request.force_sync
                    && current.same_source_payload(&activity)
                    && self.streams_unchanged(&key, streams.as_ref()).await
                {
                    debug!(
                        connector = %self.connector_type,
                        activity = %key,
                        "unchanged, skipping"
                    );
                    self.stats.skipped += 1;
                    return;
                }
                current.merged_with(&activity)
            }
        };

        match store.upsert(record.clone(), streams.clone()).await {
            Ok(existed) => {
                if existed {
                    self.stats.updated += 1;
                } else {
                    self.stats.inserted += 1;
                }
                self.emit(SyncEvent::activity(record, streams, !existed)).await;
            }
            Err(e) => {
                warn!(
                    connector = %self.connector_type,
                    activity = %key,
                    error = %e,
                    "failed to store activity"
                );
                self.emit_error(store_item_error(&key, &e.to_string()))
                    .await;
            }
        }
    }

    /// Whether `incoming` streams add nothing to what is stored
    async fn streams_unchanged(
        &self,
        key: &ActivityKey,
        incoming: Option<&ActivityStreams>,
    ) -> bool {
        let Some(incoming) = incoming else {
            return true;
        };
        match self.inner.activities.find_streams(key).await {
            Ok(Some(stored)) => &stored == incoming,
            Ok(None) => false,
            Err(_) => false,
        }
    }

    async fn record_batch(&mut self, watermark: DateTime<Utc>) {
        if self.inner.config.policy != SyncStatePolicy::PerBatch || watermark <= self.watermark {
            return;
        }

        let marker = ConnectorSyncDateTime::new(self.connector_type, watermark);
        match self.inner.sync_state.upsert(marker).await {
            Ok(()) => self.watermark = watermark,
            Err(e) => {
                warn!(
                    connector = %self.connector_type,
                    error = %e,
                    "failed to save batch sync date"
                );
                self.emit_error(SyncErrorInfo::new(
                    ErrorCode::Store,
                    format!("failed to save sync date: {}", e),
                ))
                .await;
            }
        }
    }

    async fn record_completion(&mut self) {
        // The watermark of a per-batch pass may already be past the start
        let at = self.started_at.max(self.watermark);
        let marker = ConnectorSyncDateTime::new(self.connector_type, at);
        if let Err(e) = self.inner.sync_state.upsert(marker).await {
            warn!(connector = %self.connector_type, error = %e, "failed to save sync date");
            self.emit_error(SyncErrorInfo::new(
                ErrorCode::Store,
                format!("failed to save sync date: {}", e),
            ))
            .await;
        }
    }
}

fn fatal_info(error: &ConnectorError) -> SyncErrorInfo {
    SyncErrorInfo::new(error.code(), error.to_string())
}

fn store_item_error(key: &ActivityKey, description: &str) -> SyncErrorInfo {
    SyncErrorInfo::for_item(ErrorCode::Store, key.to_string(), description)
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
