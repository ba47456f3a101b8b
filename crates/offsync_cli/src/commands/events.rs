//! Events command implementation.

use super::{format_timestamp, open_existing};
use offsync_core::{EventStatus, SyncEvent};
use serde::Serialize;
use std::path::Path;

/// One outbox event as shown to the operator.
#[derive(Debug, Serialize)]
pub struct EventRow {
    /// Event id.
    pub id: String,
    /// `op:collection`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Mutated record.
    pub record_id: String,
    /// Local timestamp in milliseconds.
    pub timestamp: u64,
    /// pending, synced or failed.
    pub status: &'static str,
    /// Rejection reason for failed events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&SyncEvent> for EventRow {
    fn from(event: &SyncEvent) -> Self {
        let reason = match &event.status {
            EventStatus::Failed { reason } => Some(reason.clone()),
            _ => None,
        };
        Self {
            id: event.id.to_string(),
            kind: event.kind.to_string(),
            record_id: event.record_id.clone(),
            timestamp: event.timestamp,
            status: event.status.label(),
            reason,
        }
    }
}

/// Runs the events command.
pub fn run(
    path: &Path,
    status: Option<&str>,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_existing(path)?;
    let rows = select(&db.list_events(), status, limit)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => print!("{}", render_text(&rows)),
    }
    Ok(())
}

/// Filters events by status label and applies the limit.
pub fn select(
    events: &[SyncEvent],
    status: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<EventRow>, Box<dyn std::error::Error>> {
    if let Some(wanted) = status {
        if !matches!(wanted, "pending" | "synced" | "failed") {
            return Err(format!("unknown status {wanted:?} (pending, synced, failed)").into());
        }
    }
    Ok(events
        .iter()
        .filter(|e| status.is_none_or(|s| e.status.label() == s))
        .take(limit.unwrap_or(usize::MAX))
        .map(EventRow::from)
        .collect())
}

fn render_text(rows: &[EventRow]) -> String {
    if rows.is_empty() {
        return "No events\n".to_string();
    }
    let mut out = format!(
        "{:<36}  {:<24}  {:<20}  {:<23}  {}\n",
        "ID", "TYPE", "RECORD", "TIMESTAMP", "STATUS"
    );
    for row in rows {
        let status = match &row.reason {
            Some(reason) => format!("{} ({reason})", row.status),
            None => row.status.to_string(),
        };
        out.push_str(&format!(
            "{:<36}  {:<24}  {:<20}  {:<23}  {}\n",
            row.id,
            row.kind,
            row.record_id,
            format_timestamp(row.timestamp),
            status
        ));
    }
    out.push_str(&format!("{} event(s)\n", rows.len()));
    out
}
