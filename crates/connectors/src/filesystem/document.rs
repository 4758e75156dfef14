//! Activity document format read by the file-system connector
//!
//! ```json
//! {
//!   "id": "optional, string or number",
//!   "name": "Morning Ride",
//!   "type": "Ride",
//!   "start_time": "2024-05-01T07:30:00Z",
//!   "duration": 3600,
//!   "distance": 30000.0,
//!   "metrics": { "elevation_gain": 420 },
//!   "streams": { "time": [0, 1, 2], "heartrate": [120, 121, 125] }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use stride_protocol::{ActivityKey, ActivityKind, ActivityStreams, ConnectorType, SyncedActivity};

/// Why a document was rejected
#[derive(Debug, Error)]
pub(crate) enum DocumentError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct ActivityDocument {
    id: Option<Value>,
    name: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    start_time: DateTime<Utc>,
    duration: f64,
    distance: Option<f64>,
    #[serde(default)]
    metrics: Value,
    streams: Option<ActivityStreams>,
}

/// Parse a document into an activity and its streams
///
/// `relative_path` (forward slashes) is the source id when the document
/// has no `id`; `stem` names activities without a `name`.
pub(crate) fn parse(
    bytes: &[u8],
    relative_path: &str,
    stem: &str,
    synced_at: DateTime<Utc>,
) -> Result<(SyncedActivity, Option<ActivityStreams>), DocumentError> {
    let doc: ActivityDocument = serde_json::from_slice(bytes)?;

    let source_id = match doc.id {
        None | Some(Value::Null) => relative_path.to_string(),
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => {
            return Err(DocumentError::Invalid(
                "id must be a non-empty string or a number".into(),
            ));
        }
    };

    if !doc.duration.is_finite() || doc.duration < 0.0 {
        return Err(DocumentError::Invalid(format!(
            "duration must be a non-negative number, got {}",
            doc.duration
        )));
    }
    if let Some(distance) = doc.distance
        && (!distance.is_finite() || distance < 0.0)
    {
        return Err(DocumentError::Invalid(format!(
            "distance must be a non-negative number, got {}",
            distance
        )));
    }

    let metrics = match doc.metrics {
        Value::Null => Value::Object(Default::default()),
        obj @ Value::Object(_) => obj,
        _ => return Err(DocumentError::Invalid("metrics must be an object".into())),
    };

    if let Some(streams) = &doc.streams
        && let Err(name) = streams.sample_count()
    {
        return Err(DocumentError::Invalid(format!(
            "stream '{}' length differs from the others",
            name
        )));
    }

    let kind = ActivityKind::from(doc.kind);
    let name = doc
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| stem.to_string());

    let activity = SyncedActivity {
        key: ActivityKey::new(ConnectorType::File, source_id),
        name,
        kind,
        start_time: doc.start_time,
        duration_secs: doc.duration.round() as u64,
        distance_m: doc.distance,
        metrics,
        synced_at,
    };

    Ok((activity, doc.streams.filter(|s| !s.is_empty())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_value(value: Value) -> Result<(SyncedActivity, Option<ActivityStreams>), DocumentError> {
        parse(value.to_string().as_bytes(), "2024/ride.json", "ride", Utc::now())
    }

    #[test]
    fn test_minimal_document_uses_path_and_stem() {
        let (activity, streams) = parse_value(json!({
            "type": "Run",
            "start_time": "2024-05-01T07:30:00Z",
            "duration": 1800.4
        }))
        .unwrap();

        assert_eq!(activity.key.source_id, "2024/ride.json");
        assert_eq!(activity.name, "ride");
        assert_eq!(activity.kind, ActivityKind::Run);
        assert_eq!(activity.duration_secs, 1800);
        assert_eq!(activity.metrics, json!({}));
        assert!(streams.is_none());
    }

    #[test]
    fn test_numeric_id() {
        let (activity, _) = parse_value(json!({
            "id": 8812,
            "type": "Ride",
            "start_time": "2024-05-01T07:30:00Z",
            "duration": 60
        }))
        .unwrap();
        assert_eq!(activity.key.source_id, "8812");
    }

    #[test]
    fn test_streams_are_kept() {
        let (_, streams) = parse_value(json!({
            "type": "Ride",
            "start_time": "2024-05-01T07:30:00Z",
            "duration": 2,
            "streams": {"time": [0, 1], "watts": [200, 210]}
        }))
        .unwrap();
        assert_eq!(streams.unwrap().get("watts"), Some(&[200.0, 210.0][..]));
    }

    #[test]
    fn test_rejects_mismatched_streams() {
        let err = parse_value(json!({
            "type": "Ride",
            "start_time": "2024-05-01T07:30:00Z",
            "duration": 2,
            "streams": {"time": [0, 1], "watts": [200]}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("watts"));
    }

    #[test]
    fn test_rejects_negative_duration() {
        let err = parse_value(json!({
            "type": "Ride",
            "start_time": "2024-05-01T07:30:00Z",
            "duration": -5
        }))
        .unwrap_err();
        assert!(matches!(err, DocumentError::Invalid(_)));
    }

    #[test]
    fn test_rejects_missing_start_time() {
        let err = parse_value(json!({"type": "Ride", "duration": 5})).unwrap_err();
        assert!(matches!(err, DocumentError::Json(_)));
    }

    #[test]
    fn test_rejects_non_object_metrics() {
        let err = parse_value(json!({
            "type": "Ride",
            "start_time": "2024-05-01T07:30:00Z",
            "duration": 5,
            "metrics": [1, 2]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("metrics"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            parse(b"not json", "x.json", "x", Utc::now()),
            Err(DocumentError::Json(_))
        ));
    }
}
