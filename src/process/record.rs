//! Value types describing one process at one point in time.

use serde::{Deserialize, Serialize};

/// Scheduler state as reported by the kernel (`/proc/<pid>/stat` field 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessStatus {
    Running,
    Sleeping,
    DiskSleep,
    Stopped,
    TracingStop,
    Zombie,
    Dead,
    Idle,
    Parked,
    #[default]
    Unknown,
}

impl ProcessStatus {
    /// Maps the single-letter state from `/proc/<pid>/stat`.
    pub fn from_state_char(c: char) -> Self {
        match c {
            'R' => ProcessStatus::Running,
            'S' => ProcessStatus::Sleeping,
            'D' => ProcessStatus::DiskSleep,
            'T' => ProcessStatus::Stopped,
            't' => ProcessStatus::TracingStop,
            'Z' => ProcessStatus::Zombie,
            'X' | 'x' => ProcessStatus::Dead,
            'I' => ProcessStatus::Idle,
            'P' => ProcessStatus::Parked,
            _ => ProcessStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Running => "running",
            ProcessStatus::Sleeping => "sleeping",
            ProcessStatus::DiskSleep => "disk-sleep",
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::TracingStop => "tracing-stop",
            ProcessStatus::Zombie => "zombie",
            ProcessStatus::Dead => "dead",
            ProcessStatus::Idle => "idle",
            ProcessStatus::Parked => "parked",
            ProcessStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-process attributes as delivered by a [`ProcessSource`](super::ProcessSource).
///
/// `cwd` and `exe_path` are absent when the caller may not read them or the
/// process exited while it was being inspected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProcess {
    pub pid: u32,
    pub ppid: u32,
    pub name: String,
    #[serde(default)]
    pub cmdline: String,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub exe_path: Option<String>,
    #[serde(default)]
    pub exe_deleted: bool,
    #[serde(default)]
    pub rss_bytes: u64,
    #[serde(default)]
    pub cpu_percent: f64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub create_time: f64,
    #[serde(default)]
    pub status: ProcessStatus,
    /// Environment carries a `TMUX=` entry.
    #[serde(default)]
    pub tmux_env: bool,
}

/// Just enough of a live process to tell it apart from a later process
/// that reuses the same pid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub create_time: f64,
}

/// Immutable snapshot of one process, produced by the collector.
///
/// `is_orphan` and `in_tmux` are derived once at collection time; nothing
/// downstream edits a record after it is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub ppid: u32,
    pub name: String,
    pub cmdline: String,
    /// Empty when unreadable.
    pub cwd: String,
    pub exe_path: Option<String>,
    /// Empty when the parent had already exited at snapshot time.
    pub parent_name: String,
    pub rss_mb: f64,
    pub cpu_percent: f64,
    pub username: String,
    /// Seconds since the Unix epoch.
    pub create_time: f64,
    pub status: ProcessStatus,
    pub is_orphan: bool,
    pub in_tmux: bool,
    pub exe_deleted: bool,
}

impl ProcessRecord {
    pub fn identity(&self) -> ProcessIdentity {
        ProcessIdentity {
            pid: self.pid,
            create_time: self.create_time,
        }
    }
}
