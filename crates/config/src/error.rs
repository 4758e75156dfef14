//! Configuration error types

use std::io;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A connector table names a type this build does not know
    #[error("connector '{name}' has unknown type '{connector_type}'")]
    UnknownConnectorType {
        /// Name of the connector table
        name: String,
        /// The rejected type
        connector_type: String,
    },

    /// Two enabled connector tables configure the same connector type
    #[error("connector type '{connector_type}' is configured more than once: {names}")]
    DuplicateConnector {
        /// The duplicated type
        connector_type: String,
        /// Tables configuring it
        names: String,
    },

    /// Validation error - invalid value
    #[error("{section} has invalid {field}: {message}")]
    InvalidValue {
        /// Section (e.g., "ipc", "sync")
        section: &'static str,
        /// Field name
        field: &'static str,
        /// Error message
        message: String,
    },
}

impl ConfigError {
    /// Create an UnknownConnectorType error
    pub fn unknown_connector_type(
        name: impl Into<String>,
        connector_type: impl Into<String>,
    ) -> Self {
        Self::UnknownConnectorType {
            name: name.into(),
            connector_type: connector_type.into(),
        }
    }

    /// Create a DuplicateConnector error
    pub fn duplicate_connector(
        connector_type: impl Into<String>,
        names: impl Into<String>,
    ) -> Self {
        Self::DuplicateConnector {
            connector_type: connector_type.into(),
            names: names.into(),
        }
    }

    /// Create an InvalidValue error
    pub fn invalid_value(
        section: &'static str,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            section,
            field,
            message: message.into(),
        }
    }
}
