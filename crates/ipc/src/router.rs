//! Dispatch of incoming requests and pushes to a `MessageHandler`
//!
//! Flags unknown to this build, and known flags the handler does not
//! serve, are answered with `Reply::unknown_message` (requests) or logged
//! (pushes). Handler failures become error replies; they never close the
//! channel.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use stride_protocol::{FlaggedMessage, MessageFlag, Reply};

use crate::channel::IpcChannel;

/// Why a handler did not produce a success value
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler does not serve this flag
    #[error("unsupported message")]
    Unsupported,

    /// The payload did not match the flag's schema
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The operation failed; the message is sent back verbatim
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl ToString) -> Self {
        Self::Failed(message.to_string())
    }
}

/// Decode a request payload into its typed form
pub fn decode_payload<T: DeserializeOwned>(payload: Value) -> Result<T, HandlerError> {
    serde_json::from_value(payload).map_err(|e| HandlerError::InvalidPayload(e.to_string()))
}

/// Encode a typed success value
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Value, HandlerError> {
    serde_json::to_value(value).map_err(|e| HandlerError::Failed(e.to_string()))
}

/// Application side of a channel
///
/// `peer` is the channel the message arrived on; handlers use it to push
/// events or issue their own requests back.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Answer a request
    async fn handle_request(
        &self,
        flag: MessageFlag,
        payload: Value,
        peer: &IpcChannel,
    ) -> Result<Value, HandlerError>;

    /// React to a push
    async fn handle_push(
        &self,
        flag: MessageFlag,
        payload: Value,
        peer: &IpcChannel,
    ) -> Result<(), HandlerError>;
}

/// Handler that serves nothing
///
/// Used by a side that only issues requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

#[async_trait]
impl MessageHandler for NoopHandler {
    async fn handle_request(
        &self,
        _: MessageFlag,
        _: Value,
        _: &IpcChannel,
    ) -> Result<Value, HandlerError> {
        Err(HandlerError::Unsupported)
    }

    async fn handle_push(&self, _: MessageFlag, _: Value, _: &IpcChannel) -> Result<(), HandlerError> {
        Err(HandlerError::Unsupported)
    }
}

/// Routes messages to a handler
#[derive(Clone)]
pub struct Router {
    handler: Arc<dyn MessageHandler>,
}

impl Router {
    pub fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self { handler }
    }

    /// Produce the reply for a request
    pub async fn dispatch_request(&self, peer: &IpcChannel, message: FlaggedMessage) -> Reply {
        let Some(flag) = message.message_flag() else {
            warn!(flag = message.flag, "request with unknown flag");
            return Reply::unknown_message(&message);
        };

        debug!(flag = %flag, "dispatching request");
        match self
            .handler
            .handle_request(flag, message.payload.clone(), peer)
            .await
        {
            Ok(value) => Reply::success(value),
            Err(HandlerError::Unsupported) => {
                warn!(flag = %flag, "request not handled on this side");
                Reply::unknown_message(&message)
            }
            Err(e) => {
                debug!(flag = %flag, error = %e, "request failed");
                Reply::error(e.to_string())
            }
        }
    }

    /// Handle a push; pushes are never answered
    pub async fn dispatch_push(&self, peer: &IpcChannel, message: FlaggedMessage) {
        let Some(flag) = message.message_flag() else {
            warn!(message = %message.describe(), "unknown push message dropped");
            return;
        };

        match self
            .handler
            .handle_push(flag, message.payload.clone(), peer)
            .await
        {
            Ok(()) => {}
            Err(HandlerError::Unsupported) => {
                warn!(message = %message.describe(), "unknown push message dropped");
            }
            Err(e) => {
                warn!(flag = %flag, error = %e, "push handler failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
