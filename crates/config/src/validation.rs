//! Configuration validation
//!
//! - Every connector table names a known type
//! - At most one enabled table per connector type
//! - Channel and buffer sizes are usable

use std::collections::BTreeMap;

use crate::Config;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_connectors(config)?;
    validate_ipc(config)?;
    validate_sync(config)?;
    Ok(())
}

fn validate_connectors(config: &Config) -> Result<()> {
    let mut by_type: BTreeMap<_, Vec<&str>> = BTreeMap::new();

    for (name, connector) in config.connectors.iter() {
        let Some(connector_type) = connector.resolved_type() else {
            return Err(ConfigError::unknown_connector_type(
                name.as_str(),
                connector.connector_type.as_str(),
            ));
        };
        if connector.enabled {
            by_type.entry(connector_type).or_default().push(name);
        }
    }

    for (connector_type, names) in by_type {
        if names.len() > 1 {
            return Err(ConfigError::duplicate_connector(
                connector_type.as_str(),
                names.join(", "),
            ));
        }
    }

    Ok(())
}

fn validate_ipc(config: &Config) -> Result<()> {
    let ipc = &config.ipc;
    if ipc.request_timeout.is_zero() {
        return Err(ConfigError::invalid_value(
            "ipc",
            "request_timeout",
            "must be greater than zero",
        ));
    }
    for (field, value) in [
        ("queue_capacity", ipc.queue_capacity),
        ("subscriber_buffer", ipc.subscriber_buffer),
        ("max_subscribers", ipc.max_subscribers),
    ] {
        if value == 0 {
            return Err(ConfigError::invalid_value("ipc", field, "must be at least 1"));
        }
    }
    if ipc.socket_path.as_os_str().is_empty() {
        return Err(ConfigError::invalid_value(
            "ipc",
            "socket_path",
            "must not be empty",
        ));
    }
    Ok(())
}

fn validate_sync(config: &Config) -> Result<()> {
    if config.sync.event_buffer == 0 {
        return Err(ConfigError::invalid_value(
            "sync",
            "event_buffer",
            "must be at least 1",
        ));
    }
    Ok(())
}
