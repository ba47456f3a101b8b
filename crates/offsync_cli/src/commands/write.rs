//! Put and delete commands.

use offsync_core::Database;
use std::path::Path;

/// Creates or replaces a record. Creates the store if needed.
pub fn put(
    path: &Path,
    collection: &str,
    id: &str,
    payload: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| format!("payload is not JSON: {e}"))?;
    let db = Database::open(path)?;
    let event = db.put(collection, id, payload)?;
    println!("Wrote {collection}/{id} (event {event})");
    Ok(())
}

/// Deletes a record.
pub fn delete(path: &Path, collection: &str, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = super::open_existing(path)?;
    let event = db.delete(collection, id)?;
    println!("Deleted {collection}/{id} (event {event})");
    Ok(())
}
