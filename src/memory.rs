//! System-wide memory summary.

use serde::Serialize;

use crate::error::SourceError;
use crate::process::source::{MemoryCounters, ProcessSource};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemorySummary {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    /// Used share of total memory, 0 when the total is unknown.
    pub percent: f64,
    pub swap_total_gb: f64,
    pub swap_used_gb: f64,
}

impl MemorySummary {
    pub fn from_counters(counters: &MemoryCounters) -> Self {
        let gb = |bytes: u64| bytes as f64 / BYTES_PER_GB;
        let percent = if counters.total > 0 {
            counters.used as f64 / counters.total as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_gb: gb(counters.total),
            used_gb: gb(counters.used),
            free_gb: gb(counters.free),
            percent,
            swap_total_gb: gb(counters.swap_total),
            swap_used_gb: gb(counters.swap_used),
        }
    }
}

pub fn read_memory_summary<S: ProcessSource>(source: &S) -> Result<MemorySummary, SourceError> {
    Ok(MemorySummary::from_counters(&source.read_memory_counters()?))
}
