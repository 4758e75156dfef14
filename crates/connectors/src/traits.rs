//! Connector trait and the event sequence it produces

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Notify, mpsc};

use stride_protocol::{
    ActivityStreams, ConnectorType, RemoteConnectorInfo, SyncErrorInfo, SyncedActivity,
};

use crate::error::{ConnectorError, Result};

/// Parameters of one sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    /// Only discover records newer than `last_sync`
    pub fast_sync: bool,
    /// Re-emit every record, ignoring `last_sync`
    pub force_sync: bool,
    /// Last successful sync of this connector (epoch when never synced)
    pub last_sync: DateTime<Utc>,
}

impl SyncRequest {
    /// Full scan, no date filter
    pub fn full() -> Self {
        Self {
            fast_sync: false,
            force_sync: false,
            last_sync: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Lower bound for discovery, if any
    ///
    /// Force sync wins over fast sync.
    pub fn since(&self) -> Option<DateTime<Utc>> {
        (self.fast_sync && !self.force_sync).then_some(self.last_sync)
    }
}

/// A normalized record a connector discovered
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityCandidate {
    pub activity: SyncedActivity,
    pub streams: Option<ActivityStreams>,
}

/// One element of the lazy sequence a connector produces
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent {
    /// A record to reconcile against the store
    Candidate(ActivityCandidate),
    /// Free-form progress
    Progress(String),
    /// Informational notice
    Info(String),
    /// One record failed; the sequence continues
    ItemError(SyncErrorInfo),
    /// Every record up to `watermark` has been emitted
    BatchCompleted { watermark: DateTime<Utc> },
    /// Remote credentials were renewed during the pass
    CredentialsRefreshed(RemoteConnectorInfo),
}

/// How a pass ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The source was exhausted
    Completed,
    /// A stop request was observed
    Stopped,
}

/// Producer side of a connector's event sequence
///
/// Backed by a bounded channel: `send` suspends while the consumer is busy.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: mpsc::Sender<ConnectorEvent>,
}

impl EventSink {
    pub fn new(sender: mpsc::Sender<ConnectorEvent>) -> Self {
        Self { sender }
    }

    /// Create a sink and its receiving end
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ConnectorEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }

    pub async fn send(&self, event: ConnectorEvent) -> Result<()> {
        self.sender
            .send(event)
            .await
            .map_err(|_| ConnectorError::SinkClosed)
    }

    pub async fn candidate(
        &self,
        activity: SyncedActivity,
        streams: Option<ActivityStreams>,
    ) -> Result<()> {
        self.send(ConnectorEvent::Candidate(ActivityCandidate { activity, streams }))
            .await
    }

    pub async fn progress(&self, description: impl Into<String>) -> Result<()> {
        self.send(ConnectorEvent::Progress(description.into())).await
    }

    pub async fn info(&self, description: impl Into<String>) -> Result<()> {
        self.send(ConnectorEvent::Info(description.into())).await
    }

    pub async fn item_error(&self, error: SyncErrorInfo) -> Result<()> {
        self.send(ConnectorEvent::ItemError(error)).await
    }

    pub async fn batch_completed(&self, watermark: DateTime<Utc>) -> Result<()> {
        self.send(ConnectorEvent::BatchCompleted { watermark }).await
    }
}

/// Cooperative cancellation flag shared between a connector and its owner
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake any pending waits
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Resolve once a stop was requested
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration` unless stopped first
    ///
    /// Returns true when the sleep was interrupted by a stop request.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_stopped(),
            _ = self.stopped() => true,
        }
    }
}

/// Source of activities
///
/// A connector is built for one pass from the current connection
/// parameters. `sync` emits events into the sink in source order and returns
/// how the pass ended; a returned error is fatal for the pass. `stop` may be
/// called from any task and is observed between batches (page, file).
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connector type this instance syncs
    fn connector_type(&self) -> ConnectorType;

    /// Run one sync pass
    async fn sync(&self, request: SyncRequest, events: EventSink) -> Result<SyncOutcome>;

    /// Request cooperative cancellation of the running pass
    fn stop(&self);
}
