//! Typed foreground API over the channel

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use stride_ipc::{EventFilter, EventSubscribers, IpcChannel, IpcError};
use stride_protocol::{
    ActivityKey, ConnectorType, MessageFlag, RemoteConnectorInfo, RuntimeInfo, SyncEvent,
    SyncedActivity,
};

use crate::error::Result;
use crate::messages::{ActivityRequest, StartSyncRequest, StopSyncRequest};

/// Foreground handle on the background
///
/// Every call is a request on the channel; error replies surface as
/// `DesktopError::Ipc(IpcError::Remote(..))` carrying the background's
/// message.
#[derive(Clone)]
pub struct DesktopClient {
    channel: IpcChannel,
    subscribers: Arc<EventSubscribers>,
}

impl DesktopClient {
    /// Create a client over `channel`; `subscribers` is where the
    /// foreground handler republishes SYNC_EVENT pushes
    pub fn new(channel: IpcChannel, subscribers: Arc<EventSubscribers>) -> Self {
        Self {
            channel,
            subscribers,
        }
    }

    pub fn channel(&self) -> &IpcChannel {
        &self.channel
    }

    /// Receive sync events matching `filter`
    ///
    /// Subscribe before starting a sync to see its first events.
    pub fn subscribe(&self, filter: EventFilter) -> Result<(u64, mpsc::Receiver<SyncEvent>)> {
        Ok(self.subscribers.subscribe(filter)?)
    }

    pub fn unsubscribe(&self, id: u64) -> Result<()> {
        Ok(self.subscribers.unsubscribe(id)?)
    }

    /// Start a sync pass; its events arrive through `subscribe`
    pub async fn start_sync(
        &self,
        connector_type: ConnectorType,
        fast_sync: bool,
        force_sync: bool,
    ) -> Result<()> {
        let request = StartSyncRequest {
            connector_type,
            fast_sync,
            force_sync,
        };
        let _: Value = self.channel.call(MessageFlag::StartSync, &request).await?;
        Ok(())
    }

    /// Ask the running pass of `connector_type` to stop
    pub async fn stop_sync(&self, connector_type: ConnectorType) -> Result<()> {
        let _: Value = self
            .channel
            .call(MessageFlag::StopSync, &StopSyncRequest { connector_type })
            .await?;
        Ok(())
    }

    /// Store remote credentials in the background
    pub async fn link_remote_connector(&self, info: &RemoteConnectorInfo) -> Result<()> {
        let _: Value = self
            .channel
            .call(MessageFlag::LinkRemoteConnector, info)
            .await?;
        Ok(())
    }

    pub async fn runtime_info(&self) -> Result<RuntimeInfo> {
        Ok(self
            .channel
            .call(MessageFlag::GetRuntimeInfo, &Value::Null)
            .await?)
    }

    /// Recompute the derived metrics of a stored activity
    ///
    /// The result is returned, not stored.
    pub async fn compute_activity(&self, key: &ActivityKey) -> Result<SyncedActivity> {
        let request = ActivityRequest { key: key.clone() };
        Ok(self
            .channel
            .call(MessageFlag::ComputeActivity, &request)
            .await?)
    }

    /// Start a pass and wait for its terminal event
    ///
    /// Every event of the pass, terminal one included, is passed to
    /// `on_event`. A slow `on_event` may lose events to a full queue; the
    /// terminal event is still delivered, taken from the subscribers'
    /// terminal record when the queue dropped it. Fails with
    /// `IpcError::Closed` if the channel closes first.
    pub async fn sync_and_wait<F>(
        &self,
        connector_type: ConnectorType,
        fast_sync: bool,
        force_sync: bool,
        mut on_event: F,
    ) -> Result<SyncEvent>
    where
        F: FnMut(&SyncEvent),
    {
        let (id, mut events) = self.subscribe(EventFilter::connector(connector_type))?;
        let mut terminals = self.subscribers.watch_terminals();
        let seen = terminals
            .borrow_and_update()
            .get(&connector_type)
            .map(|(seq, _)| *seq);

        let started = self.start_sync(connector_type, fast_sync, force_sync).await;
        if let Err(e) = started {
            let _ = self.unsubscribe(id);
            return Err(e);
        }

        let terminal = 'wait: loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(event) => {
                        on_event(&event);
                        if event.is_terminal() {
                            break Some(event);
                        }
                    }
                    None => break None,
                },
                Ok(()) = terminals.changed() => {
                    let recorded = terminals
                        .borrow_and_update()
                        .get(&connector_type)
                        .filter(|(seq, _)| Some(*seq) != seen)
                        .map(|(_, event)| event.clone());
                    let Some(recorded) = recorded else {
                        continue;
                    };

                    // the queue holds everything it will ever get of this pass
                    while let Ok(event) = events.try_recv() {
                        on_event(&event);
                        if event.is_terminal() {
                            break 'wait Some(event);
                        }
                    }
                    debug!(
                        connector = %connector_type,
                        dropped = self.subscribers.dropped(id).unwrap_or_default(),
                        "terminal event was dropped, using the recorded one"
                    );
                    on_event(&recorded);
                    break Some(recorded);
                }
                _ = self.channel.closed() => break None,
            }
        };
        let _ = self.unsubscribe(id);

        terminal.ok_or_else(|| IpcError::Closed.into())
    }
}
