//! Remote API payloads and their mapping to the activity model

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use stride_protocol::{ActivityKey, ActivityKind, ActivityStreams, ConnectorType, SyncedActivity};

/// Summary activity as returned by the listing endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct ApiActivity {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub sport_type: Option<String>,
    pub start_date: DateTime<Utc>,
    pub elapsed_time: u64,
    pub moving_time: Option<u64>,
    pub distance: Option<f64>,
    pub total_elevation_gain: Option<f64>,
    pub average_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub average_watts: Option<f64>,
    pub average_cadence: Option<f64>,
    pub kilojoules: Option<f64>,
    #[serde(default)]
    pub trainer: bool,
    #[serde(default)]
    pub commute: bool,
}

impl ApiActivity {
    /// Normalize into a synced activity
    pub fn into_activity(self, synced_at: DateTime<Utc>) -> SyncedActivity {
        let mut metrics = Map::new();
        let mut put = |name: &str, value: Option<f64>| {
            if let Some(v) = value
                && let Some(n) = serde_json::Number::from_f64(v)
            {
                metrics.insert(name.to_string(), Value::Number(n));
            }
        };
        put("moving_time", self.moving_time.map(|t| t as f64));
        put("elevation_gain", self.total_elevation_gain);
        put("average_speed", self.average_speed);
        put("max_speed", self.max_speed);
        put("average_heartrate", self.average_heartrate);
        put("max_heartrate", self.max_heartrate);
        put("average_watts", self.average_watts);
        put("average_cadence", self.average_cadence);
        put("kilojoules", self.kilojoules);
        if self.trainer {
            metrics.insert("trainer".into(), Value::Bool(true));
        }
        if self.commute {
            metrics.insert("commute".into(), Value::Bool(true));
        }

        let kind = self
            .sport_type
            .or(self.activity_type)
            .map(ActivityKind::from)
            .unwrap_or_else(|| ActivityKind::Other("Workout".to_string()));

        let name = if self.name.trim().is_empty() {
            format!("{} activity", kind)
        } else {
            self.name
        };

        SyncedActivity {
            key: ActivityKey::new(ConnectorType::Remote, self.id.to_string()),
            name,
            kind,
            start_time: self.start_date,
            duration_secs: self.elapsed_time,
            distance_m: self.distance,
            metrics: Value::Object(metrics),
            synced_at,
        }
    }
}

/// Response of the token endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Epoch seconds
    pub expires_at: i64,
}

/// Stream keys requested from the API
pub(crate) const STREAM_KEYS: &str =
    "time,distance,heartrate,watts,altitude,cadence,velocity_smooth,grade_smooth";

/// Map API stream names to local ones
fn stream_name(api_name: &str) -> &str {
    match api_name {
        "velocity_smooth" => "velocity",
        "grade_smooth" => "grade",
        other => other,
    }
}

/// Parse a keyed streams response (`{"time": {"data": [...]}, ...}`)
///
/// Non-numeric series (e.g. coordinates) are skipped. Fails with the name of
/// the first series whose length differs from the others.
pub(crate) fn parse_streams(value: &Value) -> Result<ActivityStreams, String> {
    let Some(object) = value.as_object() else {
        return Err("expected an object of streams".to_string());
    };

    let mut streams = ActivityStreams::new();
    for (name, stream) in object {
        let Some(data) = stream.get("data").and_then(Value::as_array) else {
            continue;
        };
        let values: Option<Vec<f64>> = data.iter().map(Value::as_f64).collect();
        if let Some(values) = values {
            streams.insert(stream_name(name), values);
        }
    }

    streams
        .sample_count()
        .map_err(|name| format!("stream '{}' length differs from the others", name))?;
    Ok(streams)
}
