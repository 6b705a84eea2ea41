//! Verify command implementation.

use super::open_store;
use crate::Format;
use attrstore_core::VerifyReport;
use serde::Serialize;
use std::path::Path;

/// Verification summary.
#[derive(Debug, Serialize)]
pub struct VerifyResult {
    /// Store path.
    pub path: String,
    /// Number of entries that decoded cleanly.
    pub valid_entries: usize,
    /// Number of entries that did not.
    pub corrupt_entries: usize,
    /// One line per corrupt entry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn new(path: &Path, report: VerifyReport) -> Self {
        Self {
            path: path.display().to_string(),
            valid_entries: report.valid,
            corrupt_entries: report.corrupt.len(),
            errors: report.corrupt,
        }
    }

    fn is_ok(&self) -> bool {
        self.corrupt_entries == 0
    }
}

/// Runs the verify command.
pub fn run(path: &Path, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    // Opening replays the log, which checks every record's checksum.
    let store = open_store(path, false)?;
    let result = VerifyResult::new(path, store.verify()?);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_result(&result),
    }

    if result.is_ok() {
        Ok(())
    } else {
        Err("Verification failed".into())
    }
}

fn print_result(result: &VerifyResult) {
    println!("Verifying store at {}", result.path);
    println!();
    println!("  Valid entries:   {}", result.valid_entries);
    println!("  Corrupt entries: {}", result.corrupt_entries);
    for error in &result.errors {
        println!("    - {error}");
    }
    println!();
    if result.is_ok() {
        println!("✓ Store verification passed");
    } else {
        println!("✗ Store verification failed");
    }
}
