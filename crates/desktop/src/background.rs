//! Background side: owns the sync engine and serves foreground requests

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use stride_ipc::{HandlerError, IpcChannel, MessageHandler, decode_payload, encode_payload};
use stride_protocol::{
    ActivityStreams, ConnectorInfo, MessageFlag, RemoteConnectorInfo, RuntimeInfo, SyncedActivity,
};
use stride_sync::{SyncOrchestrator, SyncPass};

use crate::compute::ActivityComputer;
use crate::messages::{
    ActivityRequest, CONNECTOR_LINKED, SYNC_STARTED, SYNC_STOPPING, StartSyncRequest,
    StopSyncRequest,
};

/// Handler of the background context
///
/// START_SYNC replies as soon as the pass is started; its events follow as
/// SYNC_EVENT pushes on the channel the request arrived on.
pub struct BackgroundService {
    orchestrator: SyncOrchestrator,
    computer: Arc<dyn ActivityComputer>,
    app_version: String,
}

impl BackgroundService {
    pub fn new(orchestrator: SyncOrchestrator, computer: Arc<dyn ActivityComputer>) -> Self {
        Self {
            orchestrator,
            computer,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the version reported by GET_RUNTIME_INFO
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    async fn start_sync(&self, payload: Value, peer: &IpcChannel) -> Result<Value, HandlerError> {
        let request: StartSyncRequest = decode_payload(payload)?;
        let pass = self
            .orchestrator
            .run_sync(request.connector_type, request.fast_sync, request.force_sync)
            .await
            .map_err(HandlerError::failed)?;

        tokio::spawn(forward_events(
            pass,
            peer.clone(),
            self.orchestrator.clone(),
        ));
        Ok(json!(SYNC_STARTED))
    }

    fn stop_sync(&self, payload: Value) -> Result<Value, HandlerError> {
        let request: StopSyncRequest = decode_payload(payload)?;
        self.orchestrator
            .stop_sync(request.connector_type)
            .map_err(HandlerError::failed)?;
        Ok(json!(SYNC_STOPPING))
    }

    async fn link_remote(&self, payload: Value) -> Result<Value, HandlerError> {
        let info: RemoteConnectorInfo = decode_payload(payload)?;
        let linked = info.is_linked();
        self.orchestrator
            .save_connector_info(ConnectorInfo::Remote(info))
            .await
            .map_err(HandlerError::failed)?;
        info!(linked, "remote connector info saved");
        Ok(json!(CONNECTOR_LINKED))
    }

    fn runtime_info(&self) -> Result<Value, HandlerError> {
        let info = RuntimeInfo {
            app_version: self.app_version.clone(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            running_syncs: self.orchestrator.running(),
        };
        encode_payload(&info)
    }

    /// Fetch the activity and its streams from the foreground, recompute
    async fn compute_activity(
        &self,
        payload: Value,
        peer: &IpcChannel,
    ) -> Result<Value, HandlerError> {
        let request: ActivityRequest = decode_payload(payload)?;

        let activity: Option<SyncedActivity> = peer
            .call(MessageFlag::FindActivity, &request)
            .await
            .map_err(HandlerError::failed)?;
        let Some(activity) = activity else {
            return Err(HandlerError::failed(format!(
                "activity {} not found",
                request.key
            )));
        };

        let streams: Option<ActivityStreams> = peer
            .call(MessageFlag::FindActivityStreams, &request)
            .await
            .map_err(HandlerError::failed)?;

        let computed = self.computer.compute(&activity, streams.as_ref());
        debug!(key = %request.key, "activity recomputed");
        encode_payload(&computed)
    }
}

#[async_trait]
impl MessageHandler for BackgroundService {
    async fn handle_request(
        &self,
        flag: MessageFlag,
        payload: Value,
        peer: &IpcChannel,
    ) -> Result<Value, HandlerError> {
        match flag {
            MessageFlag::StartSync => self.start_sync(payload, peer).await,
            MessageFlag::StopSync => self.stop_sync(payload),
            MessageFlag::LinkRemoteConnector => self.link_remote(payload).await,
            MessageFlag::GetRuntimeInfo => self.runtime_info(),
            MessageFlag::ComputeActivity => self.compute_activity(payload, peer).await,
            MessageFlag::SyncEvent
            | MessageFlag::FindActivity
            | MessageFlag::FindActivityStreams => Err(HandlerError::Unsupported),
        }
    }

    async fn handle_push(
        &self,
        _: MessageFlag,
        _: Value,
        _: &IpcChannel,
    ) -> Result<(), HandlerError> {
        Err(HandlerError::Unsupported)
    }
}

/// Push every event of a pass to the foreground
///
/// If the foreground goes away the pass is asked to stop and its remaining
/// events are drained, so its bookkeeping still completes.
async fn forward_events(mut pass: SyncPass, peer: IpcChannel, orchestrator: SyncOrchestrator) {
    let connector_type = pass.connector_type();
    let mut forwarded = 0u64;
    let mut detached = false;

    while let Some(event) = pass.next().await {
        if detached {
            continue;
        }
        let payload = match serde_json::to_value(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(connector = %connector_type, error = %e, "sync event not encodable");
                continue;
            }
        };
        match peer.push(MessageFlag::SyncEvent, payload).await {
            Ok(()) => forwarded += 1,
            Err(e) => {
                warn!(connector = %connector_type, error = %e, "foreground gone, stopping sync");
                detached = true;
                let _ = orchestrator.stop_sync(connector_type);
            }
        }
    }

    debug!(connector = %connector_type, forwarded, "sync events forwarded");
}

#[cfg(test)]
#[path = "background_test.rs"]
mod tests;
