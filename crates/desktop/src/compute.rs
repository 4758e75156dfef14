//! Metric recomputation run on COMPUTE_ACTIVITY
//!
//! Physiological indices (stress scores, pace zones) belong to an external
//! transform. `StreamSummaryComputer` only derives per-stream summaries so
//! that the round trip through both contexts carries something real.

use serde_json::{Map, Value, json};

use stride_protocol::{ActivityStreams, SyncedActivity};

/// Metrics key the summaries are written under
pub const STATS_KEY: &str = "stats";

/// Recomputes the derived metrics of an activity
pub trait ActivityComputer: Send + Sync {
    /// Return the activity with its derived metrics recomputed
    fn compute(&self, activity: &SyncedActivity, streams: Option<&ActivityStreams>)
    -> SyncedActivity;
}

/// Average and maximum of every recorded stream
///
/// The `time` stream is the sample axis and is only used for the sample
/// count. Non-finite samples are ignored. When the activity has no distance,
/// the last sample of the `distance` stream is used.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamSummaryComputer;

impl ActivityComputer for StreamSummaryComputer {
    fn compute(
        &self,
        activity: &SyncedActivity,
        streams: Option<&ActivityStreams>,
    ) -> SyncedActivity {
        let mut computed = activity.clone();
        let Some(streams) = streams.filter(|s| !s.is_empty()) else {
            return computed;
        };

        let mut stats = Map::new();
        for (name, values) in streams.iter() {
            if name == "time" {
                continue;
            }
            if let Some((avg, max)) = summarize(values) {
                stats.insert(name.to_string(), json!({ "avg": avg, "max": max }));
            }
        }
        let samples = streams.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        stats.insert("samples".to_string(), json!(samples));

        let mut metrics = match computed.metrics {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("raw".to_string(), other);
                map
            }
        };
        metrics.insert(STATS_KEY.to_string(), Value::Object(stats));
        computed.metrics = Value::Object(metrics);

        if computed.distance_m.is_none() {
            computed.distance_m = streams
                .get("distance")
                .and_then(|d| d.iter().rev().copied().find(|v| v.is_finite()));
        }

        computed
    }
}

fn summarize(values: &[f64]) -> Option<(f64, f64)> {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut max = f64::NEG_INFINITY;
    for v in values.iter().copied().filter(|v| v.is_finite()) {
        count += 1;
        sum += v;
        max = max.max(v);
    }
    (count > 0).then(|| (sum / count as f64, max))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use stride_protocol::{ActivityKey, ActivityKind, ConnectorType};

    use super::*;

    fn activity(metrics: Value) -> SyncedActivity {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
        SyncedActivity {
            key: ActivityKey::new(ConnectorType::File, "a1"),
            name: "Morning".into(),
            kind: ActivityKind::Run,
            start_time: at,
            duration_secs: 1800,
            distance_m: None,
            metrics,
            synced_at: at,
        }
    }

    #[test]
    fn test_summaries_written_under_stats() {
        let streams = ActivityStreams::new()
            .with("time", vec![0.0, 1.0, 2.0, 3.0])
            .with("heartrate", vec![100.0, 120.0, 140.0, 160.0])
            .with("distance", vec![0.0, 3.0, 6.0, 9.0]);

        let computed =
            StreamSummaryComputer.compute(&activity(json!({"calories": 300})), Some(&streams));

        assert_eq!(computed.metrics["calories"], json!(300));
        let stats = &computed.metrics[STATS_KEY];
        assert_eq!(stats["heartrate"], json!({"avg": 130.0, "max": 160.0}));
        assert_eq!(stats["samples"], json!(4));
        assert!(stats.get("time").is_none());
        assert_eq!(computed.distance_m, Some(9.0));
    }

    #[test]
    fn test_without_streams_is_unchanged() {
        let original = activity(json!({"calories": 300}));
        assert_eq!(StreamSummaryComputer.compute(&original, None), original);
        assert_eq!(
            StreamSummaryComputer.compute(&original, Some(&ActivityStreams::new())),
            original
        );
    }

    #[test]
    fn test_non_finite_samples_ignored() {
        let streams = ActivityStreams::new()
            .with("watts", vec![f64::NAN, 200.0, 300.0])
            .with("cadence", vec![f64::NAN]);

        let computed = StreamSummaryComputer.compute(&activity(Value::Null), Some(&streams));

        let stats = &computed.metrics[STATS_KEY];
        assert_eq!(stats["watts"], json!({"avg": 250.0, "max": 300.0}));
        assert!(stats.get("cadence").is_none());
    }

    #[test]
    fn test_scalar_metrics_preserved() {
        let streams = ActivityStreams::new().with("altitude", vec![10.0, 20.0]);
        let computed = StreamSummaryComputer.compute(&activity(json!(42)), Some(&streams));
        assert_eq!(computed.metrics["raw"], json!(42));
        assert_eq!(computed.metrics[STATS_KEY]["altitude"]["max"], json!(20.0));
    }

    #[test]
    fn test_existing_distance_kept() {
        let mut original = activity(Value::Null);
        original.distance_m = Some(5000.0);
        let streams = ActivityStreams::new().with("distance", vec![0.0, 4990.0]);
        let computed = StreamSummaryComputer.compute(&original, Some(&streams));
        assert_eq!(computed.distance_m, Some(5000.0));
    }
}
