//! Foreground side: keeps the activity database and republishes events

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use stride_ipc::{
    EventSubscribers, HandlerError, IpcChannel, MessageHandler, decode_payload, encode_payload,
};
use stride_protocol::{MessageFlag, SyncEvent, SyncEventKind};
use stride_store::ActivityStore;

use crate::messages::ActivityRequest;

/// Handler of the foreground context
///
/// Activities carried by SYNC_EVENT pushes are written to the foreground
/// database before the event is published, so a subscriber reacting to an
/// event can already find the activity.
pub struct ForegroundService {
    activities: Arc<dyn ActivityStore>,
    subscribers: Arc<EventSubscribers>,
}

impl ForegroundService {
    pub fn new(activities: Arc<dyn ActivityStore>, subscribers: Arc<EventSubscribers>) -> Self {
        Self {
            activities,
            subscribers,
        }
    }

    pub fn subscribers(&self) -> &Arc<EventSubscribers> {
        &self.subscribers
    }

    pub fn activities(&self) -> &Arc<dyn ActivityStore> {
        &self.activities
    }

    async fn on_sync_event(&self, payload: Value) -> Result<(), HandlerError> {
        let event: SyncEvent = decode_payload(payload)?;

        if let SyncEventKind::ActivityComputed {
            activity, streams, ..
        } = &event.kind
            && let Err(e) = self
                .activities
                .upsert(activity.clone(), streams.clone())
                .await
        {
            warn!(key = %activity.key, error = %e, "failed to persist synced activity");
        }

        let delivered = self.subscribers.publish(&event);
        debug!(
            connector = %event.connector_type,
            kind = event.kind_name(),
            delivered,
            "sync event published"
        );
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for ForegroundService {
    async fn handle_request(
        &self,
        flag: MessageFlag,
        payload: Value,
        _: &IpcChannel,
    ) -> Result<Value, HandlerError> {
        match flag {
            MessageFlag::FindActivity => {
                let request: ActivityRequest = decode_payload(payload)?;
                let activity = self
                    .activities
                    .find(&request.key)
                    .await
                    .map_err(HandlerError::failed)?;
                encode_payload(&activity)
            }
            MessageFlag::FindActivityStreams => {
                let request: ActivityRequest = decode_payload(payload)?;
                let streams = self
                    .activities
                    .find_streams(&request.key)
                    .await
                    .map_err(HandlerError::failed)?;
                encode_payload(&streams)
            }
            _ => Err(HandlerError::Unsupported),
        }
    }

    async fn handle_push(
        &self,
        flag: MessageFlag,
        payload: Value,
        _: &IpcChannel,
    ) -> Result<(), HandlerError> {
        match flag {
            MessageFlag::SyncEvent => self.on_sync_event(payload).await,
            _ => Err(HandlerError::Unsupported),
        }
    }
}
