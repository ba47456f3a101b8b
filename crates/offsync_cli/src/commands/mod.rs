//! CLI command implementations.

pub mod clear_synced;
pub mod compact;
pub mod events;
pub mod status;
pub mod sync;
pub mod write;

use chrono::{DateTime, Utc};
use offsync_core::{Config, Database};
use std::path::Path;

/// Opens a store that must already exist.
pub fn open_existing(path: &Path) -> Result<Database, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    Ok(Database::open_with_config(
        path,
        Config::new().create_if_missing(false),
    )?)
}

/// Renders an event timestamp (milliseconds since the epoch).
pub fn format_timestamp(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_render_as_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00.000");
        assert_eq!(format_timestamp(1_700_000_000_123), "2023-11-14 22:13:20.123");
        assert_eq!(format_timestamp(u64::MAX), u64::MAX.to_string());
    }

    #[test]
    fn missing_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_existing(&dir.path().join("absent")).is_err());
    }
}
