//! Snapshot collection.
//!
//! Turns the raw process table of a [`ProcessSource`] into immutable
//! [`ProcessRecord`]s for one user, resolving parent names and the
//! orphan/multiplexer flags against the full table.

use tracing::debug;

use crate::process::classifier::{Classifier, ProcessIndex};
use crate::process::record::{ProcessRecord, RawProcess};
use crate::process::source::ProcessSource;

pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Whose processes end up in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerFilter {
    AllUsers,
    User(String),
}

impl OwnerFilter {
    fn accepts(&self, raw: &RawProcess) -> bool {
        match self {
            OwnerFilter::AllUsers => true,
            OwnerFilter::User(name) => raw.username == *name,
        }
    }
}

/// Takes a fresh snapshot from `source`, sorted by ascending pid.
pub fn collect<S: ProcessSource>(
    source: &S,
    classifier: &Classifier,
    owner: &OwnerFilter,
) -> Vec<ProcessRecord> {
    let raws = source.enumerate_processes();
    let records = build_records(&raws, classifier, owner);
    debug!(
        "Collected {} of {} processes for {:?}",
        records.len(),
        raws.len(),
        owner
    );
    records
}

/// Builds records from an already enumerated table.
///
/// The whole table (every owner) is indexed so parents and multiplexer
/// servers owned by other users still resolve. A pid listed twice keeps its
/// first entry.
pub fn build_records(
    raws: &[RawProcess],
    classifier: &Classifier,
    owner: &OwnerFilter,
) -> Vec<ProcessRecord> {
    let mut index: ProcessIndex = ProcessIndex::with_capacity(raws.len());
    for raw in raws {
        index.entry(raw.pid).or_insert(raw);
    }

    let mut records: Vec<ProcessRecord> = index
        .values()
        .filter(|raw| owner.accepts(raw))
        .map(|raw| {
            let parent_name = index
                .get(&raw.ppid)
                .map(|parent| parent.name.clone())
                .unwrap_or_default();
            let in_tmux = raw.tmux_env || classifier.in_multiplexer_session(raw.pid, &index);

            ProcessRecord {
                pid: raw.pid,
                ppid: raw.ppid,
                name: raw.name.clone(),
                cmdline: raw.cmdline.clone(),
                cwd: raw.cwd.clone().unwrap_or_default(),
                exe_path: raw.exe_path.clone(),
                parent_name,
                rss_mb: raw.rss_bytes as f64 / BYTES_PER_MB,
                cpu_percent: raw.cpu_percent,
                username: raw.username.clone(),
                create_time: raw.create_time,
                status: raw.status,
                is_orphan: raw.ppid == 1 && !in_tmux,
                in_tmux,
                exe_deleted: raw.exe_deleted,
            }
        })
        .collect();

    records.sort_by_key(|r| r.pid);
    records
}
