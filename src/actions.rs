//! Kill executor: turns a target selection into signals and per-pid outcomes.
//!
//! Target selection ([`plan_kill`]) is shared by preview and execution, so a
//! preview lists exactly the pids an execution against the same snapshot
//! would signal. Execution is best effort: every pid gets one
//! [`KillOutcome`] and no failure stops the batch.

use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::SelectionError;
use crate::pipeline::Selection;
use crate::process::classifier::Classifier;
use crate::process::record::ProcessRecord;
use crate::process::source::{ProcessSource, SignalDelivery, SignalKind};

pub const MSG_GONE: &str = "process no longer exists";
pub const MSG_PERMISSION: &str = "insufficient permissions";
pub const MSG_INVALID_PID: &str = "invalid pid";

/// Create times closer than this are the same process.
const CREATE_TIME_TOLERANCE_SECS: f64 = 1e-3;

/// Result for one pid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KillOutcome {
    pub pid: u32,
    pub succeeded: bool,
    pub message: String,
}

impl KillOutcome {
    fn success(pid: u32, message: impl Into<String>) -> Self {
        Self {
            pid,
            succeeded: true,
            message: message.into(),
        }
    }

    fn failure(pid: u32, message: impl Into<String>) -> Self {
        Self {
            pid,
            succeeded: false,
            message: message.into(),
        }
    }

    /// The target is gone, which is what the caller wanted anyway.
    pub fn is_already_gone(&self) -> bool {
        !self.succeeded && self.message == MSG_GONE
    }
}

impl fmt::Display for KillOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.succeeded {
            write!(f, "Killed process {}: {}", self.pid, self.message)
        } else {
            write!(f, "Failed to kill process {}: {}", self.pid, self.message)
        }
    }
}

/// Outcomes of a batch, in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KillBatchResult {
    pub outcomes: Vec<KillOutcome>,
}

impl KillBatchResult {
    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.succeeded_count()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KillOutcome> {
        self.outcomes.iter()
    }

    pub fn pids(&self) -> Vec<u32> {
        self.outcomes.iter().map(|o| o.pid).collect()
    }
}

// -------------------------------------------------------------------------
// Target selection
// -------------------------------------------------------------------------

/// What to kill: explicit pids, or whatever a selection matches.
#[derive(Debug, Clone, Default)]
pub struct KillRequest {
    pub pids: Vec<u32>,
    pub selection: Selection,
}

impl KillRequest {
    pub fn for_pids(pids: Vec<u32>) -> Self {
        Self {
            pids,
            selection: Selection::default(),
        }
    }

    pub fn for_selection(selection: Selection) -> Self {
        Self {
            pids: Vec::new(),
            selection,
        }
    }
}

/// One planned target. `record` is the snapshot entry for the pid, absent
/// when an explicitly requested pid was not in the snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct KillTarget {
    pub pid: u32,
    pub record: Option<ProcessRecord>,
}

impl KillTarget {
    pub fn name(&self) -> &str {
        self.record.as_ref().map(|r| r.name.as_str()).unwrap_or("")
    }

    pub fn rss_mb(&self) -> f64 {
        self.record.as_ref().map(|r| r.rss_mb).unwrap_or(0.0)
    }

    fn expected_create_time(&self) -> Option<f64> {
        self.record.as_ref().map(|r| r.create_time)
    }
}

/// The resolved target list shared by preview and execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KillPlan {
    pub targets: Vec<KillTarget>,
}

impl KillPlan {
    pub fn pids(&self) -> Vec<u32> {
        self.targets.iter().map(|t| t.pid).collect()
    }

    /// Sum of the targets' resident memory.
    pub fn projected_free_mb(&self) -> f64 {
        self.targets.iter().map(KillTarget::rss_mb).sum()
    }

    /// Requested pids that had no snapshot entry.
    pub fn unmatched_pids(&self) -> Vec<u32> {
        self.targets
            .iter()
            .filter(|t| t.record.is_none())
            .map(|t| t.pid)
            .collect()
    }

    /// Snapshot records of the targets, in plan order.
    pub fn records(&self) -> Vec<&ProcessRecord> {
        self.targets.iter().filter_map(|t| t.record.as_ref()).collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Resolves a request against a snapshot.
///
/// Explicit pids win over filters and keep their order. A request with
/// neither is rejected rather than treated as a no-op.
pub fn plan_kill(
    request: &KillRequest,
    classifier: &Classifier,
    records: &[ProcessRecord],
) -> Result<KillPlan, SelectionError> {
    if !request.pids.is_empty() {
        if request.selection.has_target_filter() {
            warn!("Explicit pids given, ignoring filter presets for this kill request");
        }
        let targets = request
            .pids
            .iter()
            .map(|&pid| KillTarget {
                pid,
                record: records.iter().find(|r| r.pid == pid).cloned(),
            })
            .collect();
        return Ok(KillPlan { targets });
    }

    if !request.selection.has_target_filter() {
        return Err(SelectionError::AmbiguousSelection);
    }

    let targets = request
        .selection
        .select(classifier, records)
        .into_iter()
        .map(|record| KillTarget {
            pid: record.pid,
            record: Some(record.clone()),
        })
        .collect();
    Ok(KillPlan { targets })
}

// -------------------------------------------------------------------------
// Execution
// -------------------------------------------------------------------------

/// Sends signals through a [`ProcessSource`].
pub struct KillExecutor<'a, S: ProcessSource> {
    source: &'a S,
}

impl<'a, S: ProcessSource> KillExecutor<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Signals one pid after checking it still exists.
    pub fn kill(&self, pid: u32, force: bool) -> KillOutcome {
        self.attempt(pid, None, force)
    }

    /// Independent attempts, one outcome per pid in input order.
    pub fn kill_batch(&self, pids: &[u32], force: bool) -> KillBatchResult {
        let outcomes = pids.iter().map(|&pid| self.kill(pid, force)).collect();
        KillBatchResult { outcomes }
    }

    /// Executes a plan. Targets that came from the snapshot are only
    /// signalled while their create time still matches.
    pub fn execute(&self, plan: &KillPlan, force: bool) -> KillBatchResult {
        let outcomes = plan
            .targets
            .iter()
            .map(|t| self.attempt(t.pid, t.expected_create_time(), force))
            .collect();
        KillBatchResult { outcomes }
    }

    fn attempt(&self, pid: u32, expected_create_time: Option<f64>, force: bool) -> KillOutcome {
        if pid == 0 {
            return KillOutcome::failure(pid, MSG_INVALID_PID);
        }

        let Some(identity) = self.source.identify(pid) else {
            debug!("pid {} vanished before signalling", pid);
            return KillOutcome::failure(pid, MSG_GONE);
        };

        if let Some(expected) = expected_create_time {
            if (identity.create_time - expected).abs() > CREATE_TIME_TOLERANCE_SECS {
                warn!(
                    "pid {} was reused (started at {:.3}, snapshot saw {:.3}), not signalling",
                    pid, identity.create_time, expected
                );
                return KillOutcome::failure(pid, MSG_GONE);
            }
        }

        let signal = SignalKind::from_force(force);
        let outcome = match self.source.send_signal(pid, signal) {
            SignalDelivery::Delivered => KillOutcome::success(pid, format!("{} sent", signal.name())),
            SignalDelivery::NotFound => KillOutcome::failure(pid, MSG_GONE),
            SignalDelivery::PermissionDenied => KillOutcome::failure(pid, MSG_PERMISSION),
            SignalDelivery::Failed(reason) => {
                KillOutcome::failure(pid, format!("{} failed: {}", signal.name(), reason))
            }
        };

        if outcome.succeeded || outcome.is_already_gone() {
            info!("pid {}: {}", pid, outcome.message);
        } else {
            warn!("pid {}: {}", pid, outcome.message);
        }
        outcome
    }
}
