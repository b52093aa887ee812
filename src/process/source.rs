//! The OS-facing seam of the crate.
//!
//! Everything above this trait is a pure function of what it returns, which
//! lets the same pipeline run against live procfs or a recorded snapshot.

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::process::record::{ProcessIdentity, RawProcess};

/// Which signal the kill executor decided to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// SIGTERM
    Terminate,
    /// SIGKILL
    Kill,
}

impl SignalKind {
    pub fn from_force(force: bool) -> Self {
        if force {
            SignalKind::Kill
        } else {
            SignalKind::Terminate
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SignalKind::Terminate => "SIGTERM",
            SignalKind::Kill => "SIGKILL",
        }
    }
}

/// Result of a single signal delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalDelivery {
    Delivered,
    NotFound,
    PermissionDenied,
    Failed(String),
}

/// System-wide memory counters, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCounters {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub swap_total: u64,
    pub swap_used: u64,
}

/// Source of process and memory data plus the signal primitive.
pub trait ProcessSource {
    /// Lists every process visible to the caller. A process that cannot be
    /// read is left out; the call itself does not fail because of it.
    fn enumerate_processes(&self) -> Vec<RawProcess>;

    /// Looks up a single live process, `None` when it no longer exists.
    fn identify(&self, pid: u32) -> Option<ProcessIdentity>;

    fn read_memory_counters(&self) -> Result<MemoryCounters, SourceError>;

    fn send_signal(&self, pid: u32, signal: SignalKind) -> SignalDelivery;
}
