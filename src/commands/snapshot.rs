//! Snapshot command implementation.
//!
//! Records the raw process table and memory counters as JSON, loadable later
//! with `--snapshot-file`.

use procsweep::process::SnapshotFile;
use std::fs;
use std::path::Path;

use super::AnySource;
use crate::config::Config;

/// Writes a snapshot to `output`, or stdout for `-`.
pub fn command_snapshot(output: &Path, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let source = AnySource::open(config)?;
    let snapshot = SnapshotFile::capture(&source)?;
    let content = serde_json::to_string_pretty(&snapshot)?;

    if output.to_string_lossy() == "-" {
        println!("{}", content);
    } else {
        fs::write(output, content)?;
        eprintln!(
            "✅ Snapshot of {} processes written to: {}",
            snapshot.processes.len(),
            output.display()
        );
    }

    Ok(())
}
