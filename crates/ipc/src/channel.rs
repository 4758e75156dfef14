//! Bidirectional message channel
//!
//! One `IpcChannel` per side of a byte stream. Each side can issue
//! requests (correlated to replies by id), send pushes, and serves the
//! other side's messages through its `MessageHandler`.
//!
//! # Tasks
//!
//! ```text
//!             ┌──────────── reader task ────────────┐
//! stream ───► │ Reply   → pending[id].send(reply)   │
//!             │ Request → spawn(router → Reply)     │──► outbound
//!             │ Push    → push queue (in order)     │
//!             └─────────────────────────────────────┘
//! outbound ─► writer task ──► stream
//! ```
//!
//! Requests run concurrently, so a slow handler never delays the answer to
//! another request. Pushes are handled one at a time in arrival order.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use stride_protocol::{FlaggedMessage, Frame, MessageFlag, ProtocolError, Reply};

use crate::error::{IpcError, Result};
use crate::router::{MessageHandler, Router};
use crate::transport::{FrameReader, FrameWriter};

/// Default time a request waits for its reply
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default capacity of the outbound and push queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Capacity of the in-process pipe created by `IpcChannel::pair`
const PIPE_CAPACITY: usize = 64 * 1024;

/// Channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Time a request waits for its reply
    pub request_timeout: Duration,
    /// Capacity of the outbound and push queues
    pub queue_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

enum Outbound {
    Frame(Bytes),
    Shutdown,
}

/// One side of a message channel
///
/// Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct IpcChannel {
    inner: Arc<Inner>,
}

struct Inner {
    name: &'static str,
    outbound: mpsc::Sender<Outbound>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    closed_tx: watch::Sender<bool>,
    config: ChannelConfig,
}

impl IpcChannel {
    /// Start a channel over a byte stream
    ///
    /// `name` labels log lines ("background", "foreground"). Messages from
    /// the peer are served by `handler`.
    pub fn spawn<R, W>(
        name: &'static str,
        reader: R,
        writer: W,
        handler: Arc<dyn MessageHandler>,
        config: ChannelConfig,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::channel(config.queue_capacity);
        let (closed_tx, _) = watch::channel(false);

        let channel = Self {
            inner: Arc::new(Inner {
                name,
                outbound,
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                closed_tx,
                config,
            }),
        };

        let (push_tx, push_rx) = mpsc::channel(config.queue_capacity);
        let router = Router::new(handler);

        tokio::spawn(write_loop(name, FrameWriter::new(writer), outbound_rx));
        tokio::spawn(push_loop(channel.clone(), router.clone(), push_rx));
        tokio::spawn(read_loop(
            channel.clone(),
            router,
            FrameReader::new(reader),
            push_tx,
        ));

        debug!(channel = name, "channel started");
        channel
    }

    /// Connect two handlers through an in-process pipe
    ///
    /// Returns `(first, second)`: `first` is served by `first_handler` and
    /// talks to `second`, and the reverse.
    pub fn pair(
        first_handler: Arc<dyn MessageHandler>,
        second_handler: Arc<dyn MessageHandler>,
        config: ChannelConfig,
    ) -> (Self, Self) {
        let (a, b) = tokio::io::duplex(PIPE_CAPACITY);
        let (a_read, a_write) = tokio::io::split(a);
        let (b_read, b_write) = tokio::io::split(b);
        (
            Self::spawn("background", a_read, a_write, first_handler, config),
            Self::spawn("foreground", b_read, b_write, second_handler, config),
        )
    }

    /// Channel configuration
    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    /// Check if the channel is closed
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Wait until the channel is closed
    pub async fn closed(&self) {
        let mut rx = self.inner.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Number of requests awaiting a reply
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Send a request and wait for its reply with the default timeout
    pub async fn request(&self, flag: MessageFlag, payload: Value) -> Result<Reply> {
        self.request_timeout(flag, payload, self.inner.config.request_timeout)
            .await
    }

    /// Send a request and wait for its reply
    ///
    /// On timeout the request is forgotten; a reply arriving later is
    /// dropped. A timeout says nothing about whether the peer acted.
    pub async fn request_timeout(
        &self,
        flag: MessageFlag,
        payload: Value,
        timeout: Duration,
    ) -> Result<Reply> {
        self.roundtrip(FlaggedMessage::new(flag, payload), timeout)
            .await
    }

    /// Typed request: serialize `payload`, deserialize the success value
    ///
    /// An error reply becomes `IpcError::Remote`.
    pub async fn call<P, T>(&self, flag: MessageFlag, payload: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_value(payload)?;
        let value = self
            .request(flag, payload)
            .await?
            .into_result()
            .map_err(IpcError::Remote)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Send a push; pushes are never answered
    pub async fn push(&self, flag: MessageFlag, payload: Value) -> Result<()> {
        let encoded = Frame::Push(FlaggedMessage::new(flag, payload)).encode()?;
        self.send(Outbound::Frame(encoded)).await
    }

    /// Send a raw message with a possibly unknown flag
    pub async fn push_raw(&self, message: FlaggedMessage) -> Result<()> {
        let encoded = Frame::Push(message).encode()?;
        self.send(Outbound::Frame(encoded)).await
    }

    /// Send a request with a possibly unknown flag
    pub async fn request_raw(&self, message: FlaggedMessage) -> Result<Reply> {
        self.roundtrip(message, self.inner.config.request_timeout)
            .await
    }

    async fn roundtrip(&self, message: FlaggedMessage, timeout: Duration) -> Result<Reply> {
        if self.is_closed() {
            return Err(IpcError::Closed);
        }

        let label = describe_flag(message.flag);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let encoded = Frame::Request { id, message }.encode()?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner.pending.lock().insert(id, reply_tx);

        // The reader may have closed between the first check and the insert
        if self.is_closed() || self.send(Outbound::Frame(encoded)).await.is_err() {
            self.inner.pending.lock().remove(&id);
            return Err(IpcError::Closed);
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(IpcError::Closed),
            Err(_) => {
                self.inner.pending.lock().remove(&id);
                warn!(
                    channel = self.inner.name,
                    flag = %label,
                    id,
                    timeout_ms = timeout.as_millis() as u64,
                    "request timed out"
                );
                Err(IpcError::Timeout {
                    flag: label,
                    after: timeout,
                })
            }
        }
    }

    /// Close the write side; the peer sees end of stream
    pub async fn close(&self) {
        let _ = self.inner.outbound.send(Outbound::Shutdown).await;
    }

    async fn send(&self, outbound: Outbound) -> Result<()> {
        if self.is_closed() {
            return Err(IpcError::Closed);
        }
        self.inner
            .outbound
            .send(outbound)
            .await
            .map_err(|_| IpcError::Closed)
    }

    fn complete(&self, id: u64, reply: Reply) {
        let waiter = self.inner.pending.lock().remove(&id);
        match waiter {
            Some(waiter) => {
                // The requester may have given up in the meantime
                let _ = waiter.send(reply);
            }
            None => {
                warn!(
                    channel = self.inner.name,
                    id,
                    "reply for unknown or expired request dropped"
                );
            }
        }
    }

    /// Mark closed and fail every pending request
    fn shut(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let pending: Vec<_> = self.inner.pending.lock().drain().collect();
        if !pending.is_empty() {
            debug!(
                channel = self.inner.name,
                pending = pending.len(),
                "failing pending requests"
            );
        }
        drop(pending);
        self.inner.closed_tx.send_replace(true);
        info!(channel = self.inner.name, "channel closed");
    }
}

/// Flag name for logs and errors, the raw value when unknown
fn describe_flag(flag: u8) -> String {
    match MessageFlag::from_u8(flag) {
        Some(known) => known.as_str().to_string(),
        None => format!("flag {}", flag),
    }
}

async fn write_loop<W>(
    name: &'static str,
    mut writer: FrameWriter<W>,
    mut outbound: mpsc::Receiver<Outbound>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Frame(encoded) => {
                if let Err(e) = writer.write_encoded(&encoded).await {
                    warn!(channel = name, error = %e, "failed to write frame");
                    break;
                }
            }
            Outbound::Shutdown => {
                if let Err(e) = writer.shutdown().await {
                    debug!(channel = name, error = %e, "shutdown failed");
                }
                break;
            }
        }
    }
}

async fn read_loop<R>(
    channel: IpcChannel,
    router: Router,
    mut reader: FrameReader<R>,
    pushes: mpsc::Sender<FlaggedMessage>,
) where
    R: AsyncRead + Unpin,
{
    let name = channel.inner.name;
    loop {
        match reader.read_frame().await {
            Ok(Some(Frame::Reply { id, reply })) => channel.complete(id, reply),
            Ok(Some(Frame::Request { id, message })) => {
                let channel = channel.clone();
                let router = router.clone();
                tokio::spawn(async move {
                    let reply = router.dispatch_request(&channel, message).await;
                    let encoded = match (Frame::Reply { id, reply }).encode() {
                        Ok(encoded) => encoded,
                        Err(e) => {
                            warn!(
                                channel = channel.inner.name,
                                id,
                                error = %e,
                                "reply not encodable"
                            );
                            let fallback = Frame::Reply {
                                id,
                                reply: Reply::error(e.to_string()),
                            };
                            match fallback.encode() {
                                Ok(encoded) => encoded,
                                Err(_) => return,
                            }
                        }
                    };
                    if channel.send(Outbound::Frame(encoded)).await.is_err() {
                        debug!(
                            channel = channel.inner.name,
                            id,
                            "reply not sent, channel closed"
                        );
                    }
                });
            }
            Ok(Some(Frame::Push(message))) => {
                if pushes.send(message).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!(channel = name, "peer closed the stream");
                break;
            }
            Err(IpcError::Decode(e)) if !matches!(e, ProtocolError::FrameTooLarge { .. }) => {
                warn!(channel = name, error = %e, "undecodable frame dropped");
            }
            Err(e) => {
                warn!(channel = name, error = %e, "read failed");
                break;
            }
        }
    }
    channel.shut();
}

async fn push_loop(
    channel: IpcChannel,
    router: Router,
    mut pushes: mpsc::Receiver<FlaggedMessage>,
) {
    while let Some(message) = pushes.recv().await {
        router.dispatch_push(&channel, message).await;
    }
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod tests;
