//! Clear-synced command implementation.

use super::open_existing;
use std::io::{BufRead, Write};
use std::path::Path;

/// Runs the clear-synced command.
///
/// Without `yes` the operator must confirm on stdin.
pub fn run(path: &Path, yes: bool) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_existing(path)?;
    let synced = db.synced_count();
    if synced == 0 {
        println!("No synced events to clear");
        return Ok(());
    }

    if !yes {
        print!(
            "Delete {synced} synced event(s)? Pending and failed events are kept. [y/N] "
        );
        std::io::stdout().flush()?;
        let stdin = std::io::stdin();
        if !confirmed(&mut stdin.lock())? {
            println!("Aborted");
            return Ok(());
        }
    }

    let removed = db.clear_synced()?;
    println!("Removed {removed} synced event(s); {} pending", db.pending_count());
    Ok(())
}

/// Reads one answer line; only `y` or `yes` confirms.
pub fn confirmed(input: &mut impl BufRead) -> std::io::Result<bool> {
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use offsync_core::Database;
    use serde_json::json;

    #[test]
    fn confirmation_answers() {
        assert!(confirmed(&mut "y\n".as_bytes()).unwrap());
        assert!(confirmed(&mut " YES \n".as_bytes()).unwrap());
        assert!(!confirmed(&mut "\n".as_bytes()).unwrap());
        assert!(!confirmed(&mut "nope\n".as_bytes()).unwrap());
        assert!(!confirmed(&mut "".as_bytes()).unwrap());
    }

    #[test]
    fn clears_only_synced() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Database::open(dir.path()).unwrap();
            for i in 0..5 {
                let id = db.put("clients", &format!("c-{i}"), json!({})).unwrap();
                db.mark_synced(&id).unwrap();
            }
            db.put("clients", "p-1", json!({})).unwrap();
            db.put("clients", "p-2", json!({})).unwrap();
        }

        run(dir.path(), true).unwrap();

        let db = Database::open(dir.path()).unwrap();
        assert_eq!(db.event_count(), 2);
        assert_eq!(db.pending_count(), 2);
    }
}
