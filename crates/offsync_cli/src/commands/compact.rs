//! Compact command implementation.

use super::open_existing;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_existing(path)?;
    let before = db.log_size()?;
    db.compact()?;
    let after = db.log_size()?;

    println!("Compacted commit log at {}", path.display());
    println!("  Size before: {before} bytes");
    println!("  Size after:  {after} bytes");
    if before > 0 {
        let saved = before.saturating_sub(after);
        println!(
            "  Space saved: {saved} bytes ({:.1}%)",
            saved as f64 / before as f64 * 100.0
        );
    }
    Ok(())
}
