//! Local multicast of sync events
//!
//! The foreground republishes every SYNC_EVENT push to its subscribers
//! (views, CLI printers). Each subscriber gets:
//! - Unique ID for the subscription
//! - Optional filter on connector types
//! - Bounded queue; a full queue drops the event for that subscriber only
//!
//! `EventSubscribers` handles registration, removal, and fan-out. It also
//! keeps the latest terminal event of each connector type on a watch
//! channel, so a waiter whose queue overflowed still learns the pass ended.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use stride_protocol::{ConnectorType, SyncEvent};

use crate::error::{IpcError, Result};

/// Counter for generating unique subscriber IDs
static SUBSCRIBER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Default maximum number of concurrent subscribers
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 64;

/// Default queue size per subscriber
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Latest terminal event per connector type, with a per-type sequence
/// number starting at 1
pub type TerminalEvents = HashMap<ConnectorType, (u64, SyncEvent)>;

/// Which events a subscriber wants
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Connector types to receive; empty means all
    pub connector_types: Vec<ConnectorType>,
}

impl EventFilter {
    /// Receive every event
    pub fn all() -> Self {
        Self::default()
    }

    /// Receive events of one connector type
    pub fn connector(connector_type: ConnectorType) -> Self {
        Self {
            connector_types: vec![connector_type],
        }
    }

    #[inline]
    pub fn matches(&self, event: &SyncEvent) -> bool {
        self.connector_types.is_empty() || self.connector_types.contains(&event.connector_type)
    }
}

/// A single event subscriber
#[derive(Debug)]
pub struct Subscriber {
    id: u64,
    filter: EventFilter,
    sender: mpsc::Sender<SyncEvent>,
    /// Events lost because the queue was full
    dropped: AtomicU64,
}

impl Subscriber {
    fn new(filter: EventFilter, sender: mpsc::Sender<SyncEvent>) -> Self {
        Self {
            id: SUBSCRIBER_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            filter,
            sender,
            dropped: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Events dropped so far
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Try to queue an event without waiting
    ///
    /// Returns false when the queue is full or the receiver is gone.
    fn try_send(&self, event: SyncEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(subscriber_id = self.id, "subscriber queue full, event dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Manages all active subscribers
#[derive(Debug)]
pub struct EventSubscribers {
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
    terminals: watch::Sender<TerminalEvents>,
    buffer: usize,
    max: usize,
}

impl Default for EventSubscribers {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER, DEFAULT_MAX_SUBSCRIBERS)
    }
}

impl EventSubscribers {
    /// Create a manager with a per-subscriber queue size and a subscriber cap
    pub fn new(buffer: usize, max: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            terminals: watch::Sender::new(TerminalEvents::new()),
            buffer: buffer.max(1),
            max,
        }
    }

    /// Register a new subscriber
    ///
    /// Returns the subscriber ID and receiver channel
    pub fn subscribe(&self, filter: EventFilter) -> Result<(u64, mpsc::Receiver<SyncEvent>)> {
        let mut subscribers = self.subscribers.write();

        if subscribers.len() >= self.max {
            // Make room if some receivers are already gone
            subscribers.retain(|s| s.is_connected());
            if subscribers.len() >= self.max {
                return Err(IpcError::MaxSubscribers { max: self.max });
            }
        }

        let (sender, receiver) = mpsc::channel(self.buffer);
        let subscriber = Arc::new(Subscriber::new(filter, sender));
        let id = subscriber.id();
        subscribers.push(subscriber);

        Ok((id, receiver))
    }

    /// Unsubscribe by ID
    pub fn unsubscribe(&self, id: u64) -> Result<()> {
        let mut subscribers = self.subscribers.write();
        let original_len = subscribers.len();
        subscribers.retain(|s| s.id() != id);

        if subscribers.len() == original_len {
            return Err(IpcError::SubscriberNotFound { id });
        }
        Ok(())
    }

    /// Get number of active subscribers
    pub fn count(&self) -> usize {
        self.subscribers.read().len()
    }

    #[inline]
    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.read().is_empty()
    }

    /// Events dropped for a subscriber, `None` if unknown
    pub fn dropped(&self, id: u64) -> Option<u64> {
        self.subscribers
            .read()
            .iter()
            .find(|s| s.id() == id)
            .map(|s| s.dropped())
    }

    /// Watch the latest terminal event of each connector type
    ///
    /// Updated after the event has been offered to every subscriber, so
    /// whatever a queue holds at that point is all it will get of the pass.
    pub fn watch_terminals(&self) -> watch::Receiver<TerminalEvents> {
        self.terminals.subscribe()
    }

    /// Deliver an event to every matching subscriber
    ///
    /// Never waits: a slow subscriber loses events, others are unaffected.
    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: &SyncEvent) -> usize {
        let mut sent_count = 0;
        {
            let subscribers = self.subscribers.read();
            for subscriber in subscribers.iter() {
                if !subscriber.filter.matches(event) {
                    continue;
                }
                if subscriber.try_send(event.clone()) {
                    sent_count += 1;
                }
            }
        }

        if event.is_terminal() {
            self.terminals.send_modify(|terminals| {
                let seq = terminals
                    .get(&event.connector_type)
                    .map_or(1, |(seq, _)| seq + 1);
                terminals.insert(event.connector_type, (seq, event.clone()));
            });
        }

        sent_count
    }

    /// Clean up disconnected subscribers
    pub fn cleanup_disconnected(&self) -> usize {
        let mut subscribers = self.subscribers.write();
        let original_len = subscribers.len();
        subscribers.retain(|s| s.is_connected());
        original_len - subscribers.len()
    }
}

#[cfg(test)]
#[path = "subscriber_test.rs"]
mod tests;
