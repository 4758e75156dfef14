//! Request payloads of the envelope flags

use serde::{Deserialize, Serialize};

use stride_protocol::{ActivityKey, ConnectorType};

/// START_SYNC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSyncRequest {
    pub connector_type: ConnectorType,
    #[serde(default)]
    pub fast_sync: bool,
    #[serde(default)]
    pub force_sync: bool,
}

/// STOP_SYNC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopSyncRequest {
    pub connector_type: ConnectorType,
}

/// COMPUTE_ACTIVITY, FIND_ACTIVITY and FIND_ACTIVITY_STREAMS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRequest {
    pub key: ActivityKey,
}

/// Success value of START_SYNC
pub const SYNC_STARTED: &str = "started";

/// Success value of STOP_SYNC
pub const SYNC_STOPPING: &str = "stopping";

/// Success value of LINK_REMOTE_CONNECTOR
pub const CONNECTOR_LINKED: &str = "linked";
