//! Normalized activity records

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connector::ConnectorType;

/// Unique identity of a synced activity
///
/// `(connector_type, source_id)` is unique across the activity store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivityKey {
    pub connector_type: ConnectorType,
    /// Identifier assigned by the source (API id, file-derived id)
    pub source_id: String,
}

impl ActivityKey {
    /// Create a new activity key
    pub fn new(connector_type: ConnectorType, source_id: impl Into<String>) -> Self {
        Self {
            connector_type,
            source_id: source_id.into(),
        }
    }
}

impl fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.connector_type, self.source_id)
    }
}

/// Sport of an activity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    Ride,
    Run,
    Swim,
    Walk,
    Hike,
    /// Anything else, kept verbatim
    Other(String),
}

impl ActivityKind {
    /// Get the string name of this kind
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ride => "Ride",
            Self::Run => "Run",
            Self::Swim => "Swim",
            Self::Walk => "Walk",
            Self::Hike => "Hike",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for ActivityKind {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "ride" | "virtualride" | "ebikeride" | "cycling" => Self::Ride,
            "run" | "virtualrun" | "trailrun" | "running" => Self::Run,
            "swim" | "swimming" => Self::Swim,
            "walk" | "walking" => Self::Walk,
            "hike" | "hiking" => Self::Hike,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for ActivityKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<ActivityKind> for String {
    fn from(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized activity as produced by a connector and persisted by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedActivity {
    pub key: ActivityKey,
    pub name: String,
    pub kind: ActivityKind,
    pub start_time: DateTime<Utc>,
    /// Elapsed time in seconds
    pub duration_secs: u64,
    /// Distance in metres
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    /// Raw and derived metrics, source specific
    #[serde(default)]
    pub metrics: Value,
    /// When this record was last written by a sync pass
    pub synced_at: DateTime<Utc>,
}

impl SyncedActivity {
    /// Connector type that produced this activity
    #[inline]
    pub fn connector_type(&self) -> ConnectorType {
        self.key.connector_type
    }

    /// Compare source-derived content, ignoring bookkeeping fields
    pub fn same_source_payload(&self, other: &SyncedActivity) -> bool {
        self.key == other.key
            && self.name == other.name
            && self.kind == other.kind
            && self.start_time == other.start_time
            && self.duration_secs == other.duration_secs
            && self.distance_m == other.distance_m
            && self.metrics == other.metrics
    }

    /// Merge a newer version of the same activity into this one
    ///
    /// Source fields are replaced. Metrics objects are merged key by key with
    /// the newer values winning, so locally derived metrics survive a re-sync.
    pub fn merged_with(&self, newer: &SyncedActivity) -> SyncedActivity {
        let metrics = match (&self.metrics, &newer.metrics) {
            (Value::Object(current), Value::Object(incoming)) => {
                let mut merged = current.clone();
                for (k, v) in incoming {
                    merged.insert(k.clone(), v.clone());
                }
                Value::Object(merged)
            }
            (current, Value::Null) => current.clone(),
            (_, incoming) => incoming.clone(),
        };

        SyncedActivity {
            key: self.key.clone(),
            name: newer.name.clone(),
            kind: newer.kind.clone(),
            start_time: newer.start_time,
            duration_secs: newer.duration_secs,
            distance_m: newer.distance_m.or(self.distance_m),
            metrics,
            synced_at: newer.synced_at,
        }
    }
}

/// Named numeric series recorded during an activity
///
/// Common names: `time`, `distance`, `heartrate`, `watts`, `altitude`,
/// `cadence`, `velocity`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityStreams(BTreeMap<String, Vec<f64>>);

impl ActivityStreams {
    /// Create empty streams
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a series
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.0.insert(name.into(), values);
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.insert(name, values);
        self
    }

    /// Get a series by name
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// Iterate over `(name, values)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of series
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no series are present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check that every series has the same number of samples
    ///
    /// Returns the sample count, or the first mismatching series name.
    pub fn sample_count(&self) -> Result<usize, String> {
        let mut expected = None;
        for (name, values) in &self.0 {
            match expected {
                None => expected = Some(values.len()),
                Some(len) if len != values.len() => return Err(name.clone()),
                Some(_) => {}
            }
        }
        Ok(expected.unwrap_or(0))
    }
}

impl FromIterator<(String, Vec<f64>)> for ActivityStreams {
    fn from_iter<I: IntoIterator<Item = (String, Vec<f64>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
