//! Message discriminants exchanged between the two contexts

use std::fmt;

/// Closed set of message kinds
///
/// NOTE: These values are used on the wire and must never be renumbered.
/// Receivers must treat values outside this set as "unknown message", not
/// as a decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageFlag {
    // Foreground -> background
    StartSync = 0,
    StopSync = 1,
    LinkRemoteConnector = 2,
    GetRuntimeInfo = 3,
    ComputeActivity = 4,

    // Background -> foreground
    SyncEvent = 5,
    FindActivity = 6,
    FindActivityStreams = 7,
}

impl MessageFlag {
    /// Every known flag, in wire order
    pub const ALL: [MessageFlag; 8] = [
        Self::StartSync,
        Self::StopSync,
        Self::LinkRemoteConnector,
        Self::GetRuntimeInfo,
        Self::ComputeActivity,
        Self::SyncEvent,
        Self::FindActivity,
        Self::FindActivityStreams,
    ];

    /// Parse flag from raw byte value
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::StartSync),
            1 => Some(Self::StopSync),
            2 => Some(Self::LinkRemoteConnector),
            3 => Some(Self::GetRuntimeInfo),
            4 => Some(Self::ComputeActivity),
            5 => Some(Self::SyncEvent),
            6 => Some(Self::FindActivity),
            7 => Some(Self::FindActivityStreams),
            _ => None,
        }
    }

    /// Convert to raw byte value
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this flag is sent by the foreground
    #[inline]
    pub const fn is_from_foreground(self) -> bool {
        matches!(
            self,
            Self::StartSync
                | Self::StopSync
                | Self::LinkRemoteConnector
                | Self::GetRuntimeInfo
                | Self::ComputeActivity
        )
    }

    /// Get the string name of this flag
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartSync => "START_SYNC",
            Self::StopSync => "STOP_SYNC",
            Self::LinkRemoteConnector => "LINK_REMOTE_CONNECTOR",
            Self::GetRuntimeInfo => "GET_RUNTIME_INFO",
            Self::ComputeActivity => "COMPUTE_ACTIVITY",
            Self::SyncEvent => "SYNC_EVENT",
            Self::FindActivity => "FIND_ACTIVITY",
            Self::FindActivityStreams => "FIND_ACTIVITY_STREAMS",
        }
    }
}

impl fmt::Display for MessageFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<MessageFlag> for u8 {
    fn from(flag: MessageFlag) -> Self {
        flag.as_u8()
    }
}

impl TryFrom<u8> for MessageFlag {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(value)
    }
}
