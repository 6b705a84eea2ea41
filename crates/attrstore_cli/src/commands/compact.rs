//! Compact command implementation.

use super::open_store;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Compacting store at {:?}", path);
    println!();

    let store = open_store(path, false)?;
    let before = store.log_size().unwrap_or(0);
    store.compact()?;
    let after = store.log_size().unwrap_or(0);

    println!("  Size before: {} bytes", before);
    println!("  Size after:  {} bytes", after);
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        before.saturating_sub(after),
        if before > 0 {
            (before.saturating_sub(after) as f64 / before as f64) * 100.0
        } else {
            0.0
        }
    );
    println!("✓ Compaction complete");
    Ok(())
}
