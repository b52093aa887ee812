//! Process snapshotting and classification.
//!
//! This module provides:
//! - `record`: the `ProcessRecord` value type and raw per-process attributes
//! - `source`: the `ProcessSource` trait, the only OS-facing seam
//! - `procfs`: the Linux `/proc` implementation of `ProcessSource`
//! - `snapshot_file`: a recorded process table for offline replay
//! - `collector`: raw table to `ProcessRecord`s for one user
//! - `classifier`: orphan, killable, high-memory and system-service predicates
//! - `grouping`: clustering of duplicate program instances

pub mod classifier;
pub mod collector;
pub mod grouping;
pub mod procfs;
pub mod record;
pub mod snapshot_file;
pub mod source;

// Re-export commonly used types
pub use classifier::{display_status, is_high_memory, is_orphan, Classifier, ClassifierPolicy};
pub use collector::{build_records, collect, OwnerFilter};
pub use grouping::{duplicate_groups, group_key, group_processes, normalize_command, ProcessGroup};
pub use procfs::{current_username, ProcfsSource, DEFAULT_PROC_ROOT};
pub use record::{ProcessIdentity, ProcessRecord, ProcessStatus, RawProcess};
pub use snapshot_file::{load_snapshot_from_file, SnapshotFile, SnapshotSource};
pub use source::{MemoryCounters, ProcessSource, SignalDelivery, SignalKind};
