//! Connector configuration tables
//!
//! Each `[connectors.<name>]` table names its connector `type`; the rest of
//! the table is parsed by `stride_connectors::parse_connector`.
//!
//! # Example
//!
//! ```toml
//! [connectors.strava]
//! type = "remote"
//! client_id = "12345"
//! refresh_token = "${STRAVA_REFRESH}"
//!
//! [connectors.archive]
//! type = "file"
//! source_directory = "/home/me/activities"
//! scan_sub_directories = true
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

use stride_protocol::ConnectorType;

/// Container for all connector configurations
///
/// Connectors are stored as a map of name -> raw config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectorsConfig {
    #[serde(flatten)]
    connectors: BTreeMap<String, RawConnectorConfig>,
}

impl ConnectorsConfig {
    /// Get a connector config by name
    pub fn get(&self, name: &str) -> Option<&RawConnectorConfig> {
        self.connectors.get(name)
    }

    /// Iterate over all connectors, by name
    pub fn iter(&self) -> impl Iterator<Item = (&String, &RawConnectorConfig)> {
        self.connectors.iter()
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Enabled connectors with a known type
    pub fn enabled(&self) -> impl Iterator<Item = (&String, ConnectorType, &RawConnectorConfig)> {
        self.connectors.iter().filter_map(|(name, c)| {
            let connector_type = c.resolved_type()?;
            c.enabled.then_some((name, connector_type, c))
        })
    }

    /// The enabled connector of a type
    pub fn for_type(&self, connector_type: ConnectorType) -> Option<(&String, &RawConnectorConfig)> {
        self.enabled()
            .find(|(_, t, _)| *t == connector_type)
            .map(|(name, _, c)| (name, c))
    }
}

/// Raw connector configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RawConnectorConfig {
    /// Connector type ("remote", "file")
    #[serde(rename = "type")]
    pub connector_type: String,

    /// Whether this connector is enabled
    /// Default: true
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Connector-specific settings
    #[serde(flatten)]
    pub config: toml::Value,
}

fn default_enabled() -> bool {
    true
}

impl RawConnectorConfig {
    /// Parsed connector type, `None` when unknown
    pub fn resolved_type(&self) -> Option<ConnectorType> {
        self.connector_type.parse().ok()
    }
}
