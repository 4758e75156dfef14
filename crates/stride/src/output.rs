//! Terminal rendering of events and activities

use stride_protocol::{SyncEvent, SyncEventKind, SyncedActivity};

/// One line per event, prefixed with the connector type
pub fn event_line(event: &SyncEvent) -> String {
    let prefix = format!("[{}]", event.connector_type);
    match &event.kind {
        SyncEventKind::Started => format!("{} started", prefix),
        SyncEventKind::GenericProgress { description }
        | SyncEventKind::GenericInfo { description } => format!("{} {}", prefix, description),
        SyncEventKind::ActivityComputed {
            activity, is_new, ..
        } => {
            let verb = if *is_new { "new" } else { "updated" };
            format!("{} {:<7} {}", prefix, verb, activity_row(activity))
        }
        SyncEventKind::Stopped { cancelled: false } => format!("{} completed", prefix),
        SyncEventKind::Stopped { cancelled: true } => format!("{} cancelled", prefix),
        SyncEventKind::Error { error, fatal } => {
            let label = if *fatal { "failed" } else { "error" };
            format!("{} {}: {}", prefix, label, error)
        }
    }
}

/// `id  kind  start  duration  distance  name`
pub fn activity_row(activity: &SyncedActivity) -> String {
    let distance = activity
        .distance_m
        .map(|m| format!("{:.2} km", m / 1000.0))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}  {}  {}  {}  {}  {}",
        activity.key.source_id,
        activity.kind,
        activity.start_time.format("%Y-%m-%d %H:%M"),
        format_duration(activity.duration_secs),
        distance,
        activity.name
    )
}

/// `h:mm:ss`
pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Counters printed at the end of `stride sync`
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub new: u64,
    pub updated: u64,
    pub errors: u64,
}

impl PassSummary {
    pub fn record(&mut self, event: &SyncEvent) {
        match &event.kind {
            SyncEventKind::ActivityComputed { is_new: true, .. } => self.new += 1,
            SyncEventKind::ActivityComputed { is_new: false, .. } => self.updated += 1,
            SyncEventKind::Error { fatal: false, .. } => self.errors += 1,
            _ => {}
        }
    }
}
