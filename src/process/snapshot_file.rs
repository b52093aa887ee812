//! Replay source backed by a recorded process table.
//!
//! A snapshot file is the JSON dump written by `procsweep snapshot`. Loading
//! it lets the whole pipeline run offline; signals are recorded instead of
//! being delivered.

use ahash::AHashSet as HashSet;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::process::record::{ProcessIdentity, RawProcess};
use crate::process::source::{MemoryCounters, ProcessSource, SignalDelivery, SignalKind};

pub const SNAPSHOT_VERSION: &str = "1";

/// Root structure of a snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub version: String,
    pub generated_at: String,
    #[serde(default)]
    pub memory: MemoryCounters,
    /// Pids that answer signals with a permission error on replay.
    #[serde(default)]
    pub protected_pids: Vec<u32>,
    pub processes: Vec<RawProcess>,
}

impl SnapshotFile {
    /// Records the current state of `source`.
    pub fn capture<S: ProcessSource>(source: &S) -> Result<Self, SourceError> {
        Ok(Self {
            version: SNAPSHOT_VERSION.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            memory: source.read_memory_counters()?,
            protected_pids: Vec::new(),
            processes: source.enumerate_processes(),
        })
    }
}

/// Loads a snapshot file from disk.
pub fn load_snapshot_from_file(path: &Path) -> Result<SnapshotFile, SourceError> {
    let content = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let snapshot: SnapshotFile =
        serde_json::from_str(&content).map_err(|source| SourceError::Snapshot {
            path: path.display().to_string(),
            source,
        })?;

    info!(
        "Loaded snapshot version {} generated at {} ({} processes)",
        snapshot.version,
        snapshot.generated_at,
        snapshot.processes.len()
    );

    Ok(snapshot)
}

/// In-memory process table implementing [`ProcessSource`].
#[derive(Debug)]
pub struct SnapshotSource {
    processes: Vec<RawProcess>,
    memory: MemoryCounters,
    protected: Vec<u32>,
    sent: RwLock<Vec<(u32, SignalKind)>>,
}

impl SnapshotSource {
    pub fn new(processes: Vec<RawProcess>) -> Self {
        Self {
            processes,
            memory: MemoryCounters::default(),
            protected: Vec::new(),
            sent: RwLock::new(Vec::new()),
        }
    }

    pub fn with_memory(mut self, memory: MemoryCounters) -> Self {
        self.memory = memory;
        self
    }

    /// Pids for which `send_signal` reports a permission error.
    pub fn with_protected(mut self, pids: impl IntoIterator<Item = u32>) -> Self {
        self.protected.extend(pids);
        self
    }

    pub fn from_file(path: &Path) -> Result<Self, SourceError> {
        Ok(load_snapshot_from_file(path)?.into())
    }

    /// Signals accepted so far, in delivery order.
    pub fn sent_signals(&self) -> Vec<(u32, SignalKind)> {
        self.sent
            .read()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    fn find(&self, pid: u32) -> Option<&RawProcess> {
        self.processes.iter().find(|p| p.pid == pid)
    }
}

impl From<SnapshotFile> for SnapshotSource {
    fn from(file: SnapshotFile) -> Self {
        SnapshotSource::new(file.processes)
            .with_memory(file.memory)
            .with_protected(file.protected_pids)
    }
}

impl ProcessSource for SnapshotSource {
    fn enumerate_processes(&self) -> Vec<RawProcess> {
        // A recorded table may contain duplicates if it was edited by hand.
        let mut seen: HashSet<u32> = HashSet::new();
        self.processes
            .iter()
            .filter(|p| seen.insert(p.pid))
            .cloned()
            .collect()
    }

    fn identify(&self, pid: u32) -> Option<ProcessIdentity> {
        self.find(pid).map(|p| ProcessIdentity {
            pid: p.pid,
            create_time: p.create_time,
        })
    }

    fn read_memory_counters(&self) -> Result<MemoryCounters, SourceError> {
        Ok(self.memory)
    }

    fn send_signal(&self, pid: u32, signal: SignalKind) -> SignalDelivery {
        if self.find(pid).is_none() {
            return SignalDelivery::NotFound;
        }
        if self.protected.contains(&pid) {
            return SignalDelivery::PermissionDenied;
        }
        debug!("Replay: recording {} for pid {}", signal.name(), pid);
        match self.sent.write() {
            Ok(mut sent) => {
                sent.push((pid, signal));
                SignalDelivery::Delivered
            }
            Err(e) => SignalDelivery::Failed(format!("signal log lock poisoned: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn raw(pid: u32, name: &str) -> RawProcess {
        RawProcess {
            pid,
            ppid: 1,
            name: name.to_string(),
            create_time: 1000.0 + pid as f64,
            ..Default::default()
        }
    }

    #[test]
    fn test_send_signal_outcomes() {
        let source = SnapshotSource::new(vec![raw(10, "a"), raw(11, "b")]).with_protected([11]);

        assert_eq!(source.send_signal(10, SignalKind::Terminate), SignalDelivery::Delivered);
        assert_eq!(
            source.send_signal(11, SignalKind::Terminate),
            SignalDelivery::PermissionDenied
        );
        assert_eq!(source.send_signal(12, SignalKind::Kill), SignalDelivery::NotFound);
        assert_eq!(source.sent_signals(), vec![(10, SignalKind::Terminate)]);
    }

    #[test]
    fn test_enumerate_drops_duplicate_pids() {
        let source = SnapshotSource::new(vec![raw(10, "first"), raw(10, "second"), raw(11, "b")]);
        let procs = source.enumerate_processes();
        assert_eq!(procs.len(), 2);
        assert_eq!(procs[0].name, "first");
    }

    #[test]
    fn test_snapshot_file_roundtrip_through_disk() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("snapshot.json");

        let recorded = SnapshotSource::new(vec![raw(10, "a")]).with_memory(MemoryCounters {
            total: 100,
            used: 40,
            free: 60,
            swap_total: 0,
            swap_used: 0,
        });
        let file = SnapshotFile::capture(&recorded).expect("capture");
        fs::write(&path, serde_json::to_string_pretty(&file).expect("serialize")).expect("write");

        let loaded = SnapshotSource::from_file(&path).expect("load");
        assert_eq!(loaded.enumerate_processes(), recorded.enumerate_processes());
        assert_eq!(loaded.read_memory_counters().expect("memory").used, 40);
        assert_eq!(loaded.identify(10).map(|id| id.create_time), Some(1010.0));
    }

    #[test]
    fn test_invalid_snapshot_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").expect("write");
        assert!(matches!(
            SnapshotSource::from_file(&path),
            Err(SourceError::Snapshot { .. })
        ));
        assert!(matches!(
            SnapshotSource::from_file(&dir.path().join("missing.json")),
            Err(SourceError::Io { .. })
        ));
    }
}
