//! Channel configuration between the background and foreground

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Channel configuration
///
/// # Example
///
/// ```toml
/// [ipc]
/// request_timeout = "30s"
/// socket_path = "/tmp/stride.sock"
/// subscriber_buffer = 256
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IpcConfig {
    /// How long a request waits for its reply
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Outbound frames buffered per channel
    /// Default: 256
    pub queue_capacity: usize,

    /// Unix socket of `stride serve`
    /// Default: "/tmp/stride.sock"
    pub socket_path: PathBuf,

    /// Events buffered per local subscriber before drops
    /// Default: 256
    pub subscriber_buffer: usize,

    /// Maximum local subscribers
    /// Default: 64
    pub max_subscribers: usize,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            queue_capacity: 256,
            socket_path: PathBuf::from("/tmp/stride.sock"),
            subscriber_buffer: 256,
            max_subscribers: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: IpcConfig = toml::from_str("").unwrap();
        assert_eq!(config, IpcConfig::default());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_humantime_timeout() {
        let config: IpcConfig = toml::from_str("request_timeout = \"1m 30s\"").unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(90));

        let config: IpcConfig = toml::from_str("request_timeout = \"250ms\"").unwrap();
        assert_eq!(config.request_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_timeout() {
        assert!(toml::from_str::<IpcConfig>("request_timeout = \"soon\"").is_err());
    }
}
