//! Stride Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! An empty file is a valid configuration.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use stride_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[log]\nlevel = \"debug\"").unwrap();
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [sync]
//! data_dir = "data"
//! policy = "completion"
//!
//! [ipc]
//! request_timeout = "30s"
//!
//! [connectors.archive]
//! type = "file"
//! source_directory = "/home/me/activities"
//! extract_archive_files = true
//! ```

mod connectors;
mod error;
mod ipc;
mod logging;
mod sync;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use connectors::{ConnectorsConfig, RawConnectorConfig};
pub use error::{ConfigError, Result};
pub use ipc::IpcConfig;
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use sync::{SyncConfig, SyncPolicy};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// State files and sync date policy
    pub sync: SyncConfig,

    /// Channel between the background and foreground
    pub ipc: IpcConfig,

    /// Activity sources
    pub connectors: ConnectorsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or contains invalid TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        validation::validate_config(&config)?;
        Ok(config)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
