//! Typed failures surfaced by the procsweep core.
//!
//! Per-process problems (a process vanishing mid-scan, a denied signal) are
//! never errors: they are absorbed by the collector or reported as
//! [`KillOutcome`](crate::actions::KillOutcome)s. The enums here cover the two
//! things that do abort an operation: a bad request and a broken data source.

use thiserror::Error;

/// Request errors, rejected before any OS interaction happens.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SelectionError {
    #[error("unknown filter preset '{0}', expected one of: orphans, killable, high-memory, stale")]
    UnknownFilter(String),

    #[error("unknown sort field '{0}', expected one of: memory, cpu, pid, name, cwd")]
    UnknownSortField(String),

    #[error("unknown column '{0}', expected one of: pid, name, rss_mb, cpu_percent, cwd, ppid, parent_name, status, cmdline, username")]
    UnknownColumn(String),

    #[error("malformed cwd pattern '{pattern}': {reason}")]
    InvalidCwdPattern { pattern: String, reason: String },

    #[error("cannot determine the current working directory: {0}")]
    CurrentDirUnavailable(String),

    #[error("invalid memory threshold {0} MB, expected a finite non-negative number")]
    InvalidThreshold(f64),

    #[error("kill request names neither pids nor a filter preset")]
    AmbiguousSelection,
}

/// Failures of the OS-facing process source as a whole.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid snapshot file {path}: {source}")]
    Snapshot {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
