//! Integration tests for kill planning and execution.
//!
//! Signals go to a `SnapshotSource`, which records them instead of touching
//! real processes.

use procsweep::actions::{MSG_GONE, MSG_PERMISSION};
use procsweep::process::{SignalKind, SnapshotSource};
use procsweep::{
    collect, plan_kill, Classifier, Filter, KillExecutor, KillRequest, OwnerFilter, RawProcess,
    Selection, SelectionError,
};

const MB: u64 = 1024 * 1024;

fn raw(pid: u32, ppid: u32, name: &str, rss_mb: u64) -> RawProcess {
    RawProcess {
        pid,
        ppid,
        name: name.to_string(),
        cmdline: format!("/home/dev/bin/{name}"),
        exe_path: Some(format!("/home/dev/bin/{name}")),
        rss_bytes: rss_mb * MB,
        username: "dev".to_string(),
        create_time: 1_700_000_000.0 + pid as f64,
        ..Default::default()
    }
}

fn table() -> Vec<RawProcess> {
    let mut in_tmux = raw(11, 1, "tmux-server", 5);
    in_tmux.tmux_env = true;
    vec![
        raw(10, 1, "orphan1", 10),
        in_tmux,
        raw(12, 500, "normal", 600),
        raw(13, 1, "orphan2", 40),
    ]
}

#[test]
fn test_batch_reports_missing_pid_without_failing() {
    let source = SnapshotSource::new(table());
    let executor = KillExecutor::new(&source);

    let result = executor.kill_batch(&[10, 999], false);

    assert_eq!(result.len(), 2);
    assert_eq!(result.pids(), vec![10, 999]);
    let outcomes: Vec<_> = result.iter().collect();
    assert!(outcomes[0].succeeded);
    assert!(!outcomes[1].succeeded);
    assert_eq!(outcomes[1].message, MSG_GONE);
    assert_eq!(result.succeeded_count(), 1);
    assert_eq!(result.failed_count(), 1);
}

#[test]
fn test_permission_denied_does_not_abort_batch() {
    let source = SnapshotSource::new(table()).with_protected([10]);
    let executor = KillExecutor::new(&source);

    let result = executor.kill_batch(&[10, 13], true);

    let outcomes: Vec<_> = result.iter().collect();
    assert_eq!(outcomes[0].message, MSG_PERMISSION);
    assert!(outcomes[1].succeeded);
    assert_eq!(outcomes[1].message, "SIGKILL sent");
    assert_eq!(source.sent_signals(), vec![(13, SignalKind::Kill)]);
}

#[test]
fn test_preview_matches_execution() {
    let classifier = Classifier::default();
    let source = SnapshotSource::new(table());
    let records = collect(&source, &classifier, &OwnerFilter::AllUsers);
    let request = KillRequest::for_selection(Selection::default().with_filter(Filter::Killable));

    let preview = plan_kill(&request, &classifier, &records).expect("plan");
    assert_eq!(preview.pids(), vec![13, 10]);
    assert!((preview.projected_free_mb() - 50.0).abs() < 1e-9);

    let executed = plan_kill(&request, &classifier, &records).expect("plan");
    let result = KillExecutor::new(&source).execute(&executed, false);

    let signalled: Vec<u32> = source.sent_signals().iter().map(|(pid, _)| *pid).collect();
    assert_eq!(signalled, preview.pids());
    assert_eq!(result.pids(), preview.pids());
    assert_eq!(result.succeeded_count(), 2);
}

#[test]
fn test_explicit_pids_override_filters() {
    let classifier = Classifier::default();
    let source = SnapshotSource::new(table());
    let records = collect(&source, &classifier, &OwnerFilter::AllUsers);
    let request = KillRequest {
        pids: vec![12, 999],
        selection: Selection::default().with_filter(Filter::Orphans),
    };

    let plan = plan_kill(&request, &classifier, &records).expect("plan");
    assert_eq!(plan.pids(), vec![12, 999]);
    assert_eq!(plan.unmatched_pids(), vec![999]);
    assert_eq!(plan.records().len(), 1);
    assert!((plan.projected_free_mb() - 600.0).abs() < 1e-9);
}

#[test]
fn test_floor_only_selection_is_ambiguous() {
    let classifier = Classifier::default();
    let records = collect(&SnapshotSource::new(table()), &classifier, &OwnerFilter::AllUsers);
    let request = KillRequest::for_selection(
        Selection::default().with_filter(Filter::min_memory(5.0).expect("valid")),
    );

    assert_eq!(
        plan_kill(&request, &classifier, &records).unwrap_err(),
        SelectionError::AmbiguousSelection
    );
    assert_eq!(
        plan_kill(&KillRequest::default(), &classifier, &records).unwrap_err(),
        SelectionError::AmbiguousSelection
    );
}

#[test]
fn test_reused_pid_is_not_signalled() {
    let classifier = Classifier::default();
    let before = SnapshotSource::new(table());
    let records = collect(&before, &classifier, &OwnerFilter::AllUsers);
    let plan = plan_kill(&KillRequest::for_pids(vec![10]), &classifier, &records).expect("plan");

    // Same pid, later start time: a different process.
    let mut reused = raw(10, 1, "unrelated", 10);
    reused.create_time += 3600.0;
    let after = SnapshotSource::new(vec![reused]);

    let result = KillExecutor::new(&after).execute(&plan, false);
    let outcome = result.iter().next().expect("one outcome");
    assert!(!outcome.succeeded);
    assert_eq!(outcome.message, MSG_GONE);
    assert!(after.sent_signals().is_empty());
}
