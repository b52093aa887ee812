//! Similarity grouping of processes that are the same program running more
//! than once.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::path::Path;

use crate::process::record::ProcessRecord;

/// Path prefixes whose contents change between runs of the same program.
pub const TRANSIENT_DIRS: &[&str] = &["/tmp/", "/var/tmp/", "/dev/shm/", "/run/user/"];

static KEY_INT_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-{0,2}[A-Za-z0-9_.-]+=)\d+$").expect("static regex")
});

/// A cluster of records sharing one grouping key.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessGroup {
    pub key: String,
    pub members: Vec<ProcessRecord>,
    pub total_rss_mb: f64,
    pub count: usize,
}

impl ProcessGroup {
    pub fn pids(&self) -> Vec<u32> {
        self.members.iter().map(|m| m.pid).collect()
    }
}

/// Normalizes one argument token; `None` drops it.
fn normalize_token(token: &str) -> Option<String> {
    if token.parse::<i128>().is_ok() {
        return None;
    }
    if TRANSIENT_DIRS.iter().any(|dir| token.contains(dir)) {
        return None;
    }
    if let Some(caps) = KEY_INT_ASSIGNMENT.captures(token) {
        return Some(caps[1].to_string());
    }
    Some(token.to_string())
}

/// Strips volatile tokens from an argument list: pure integers, temp-dir
/// paths and the integer value of `key=<n>` assignments.
pub fn normalize_command(args: &str) -> String {
    args.split_whitespace()
        .filter_map(normalize_token)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased executable name followed by the normalized arguments. The
/// executable token itself is replaced by the name so that the same program
/// started from different paths collapses.
pub fn group_key(p: &ProcessRecord) -> String {
    let mut tokens = p.cmdline.split_whitespace();
    let argv0 = tokens.next().unwrap_or_default();

    let name = if p.name.is_empty() {
        Path::new(argv0)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_lowercase()
    } else {
        p.name.to_lowercase()
    };

    let rest = tokens.collect::<Vec<_>>().join(" ");
    let args = normalize_command(&rest);
    if args.is_empty() {
        name
    } else {
        format!("{} {}", name, args)
    }
}

fn by_rss_desc_then_pid(a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
    b.rss_mb
        .total_cmp(&a.rss_mb)
        .then_with(|| a.pid.cmp(&b.pid))
}

/// Partitions `records` into groups, singletons included.
///
/// Members are ordered by descending RSS (pid ascending on ties); groups by
/// descending total RSS, then ascending key.
pub fn group_processes(records: &[ProcessRecord]) -> Vec<ProcessGroup> {
    let mut buckets: HashMap<String, Vec<ProcessRecord>> = HashMap::new();
    for record in records {
        buckets
            .entry(group_key(record))
            .or_default()
            .push(record.clone());
    }

    let mut groups: Vec<ProcessGroup> = buckets
        .into_iter()
        .map(|(key, mut members)| {
            members.sort_by(by_rss_desc_then_pid);
            let total_rss_mb = members.iter().map(|m| m.rss_mb).sum();
            ProcessGroup {
                key,
                count: members.len(),
                members,
                total_rss_mb,
            }
        })
        .collect();

    groups.sort_by(|a, b| {
        b.total_rss_mb
            .total_cmp(&a.total_rss_mb)
            .then_with(|| a.key.cmp(&b.key))
    });
    groups
}

/// Presentation filter for group views: drops groups below `min_count`.
pub fn duplicate_groups(groups: Vec<ProcessGroup>, min_count: usize) -> Vec<ProcessGroup> {
    groups
        .into_iter()
        .filter(|g| g.count >= min_count.max(1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pid: u32, name: &str, cmdline: &str, rss_mb: f64) -> ProcessRecord {
        ProcessRecord {
            pid,
            ppid: 1,
            name: name.to_string(),
            cmdline: cmdline.to_string(),
            rss_mb,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_command() {
        assert_eq!(normalize_command("--port 8001"), "--port");
        assert_eq!(normalize_command("--port=8001 --verbose"), "--port= --verbose");
        assert_eq!(normalize_command("run /tmp/build-123/out.sock"), "run");
        assert_eq!(normalize_command("--socket=/run/user/1000/x.sock -v"), "-v");
        assert_eq!(normalize_command("serve ./app.py v2"), "serve ./app.py v2");
        assert_eq!(normalize_command(""), "");
        assert_eq!(normalize_command("--nice -5 --retries +3"), "--nice --retries");
    }

    #[test]
    fn test_group_key_uses_lowercased_name() {
        let a = record(1, "Python", "/usr/bin/python script.py", 1.0);
        let b = record(2, "python", "/home/u/.venv/bin/python script.py", 1.0);
        assert_eq!(group_key(&a), "python script.py");
        assert_eq!(group_key(&a), group_key(&b));
    }

    #[test]
    fn test_group_key_without_name_uses_argv0_basename() {
        let p = record(1, "", "/opt/tools/indexer --full", 1.0);
        assert_eq!(group_key(&p), "indexer --full");
    }

    #[test]
    fn test_workers_on_different_ports_share_a_group() {
        let groups = group_processes(&[
            record(1, "worker", "worker --port 8001", 30.0),
            record(2, "worker", "worker --port 8002", 40.0),
            record(3, "node", "node server.js", 10.0),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "worker --port");
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].pids(), vec![2, 1]);
        assert!((groups[0].total_rss_mb - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_group_order_ties_break_on_key() {
        let groups = group_processes(&[
            record(1, "b", "b", 10.0),
            record(2, "a", "a", 10.0),
            record(3, "c", "c", 20.0),
        ]);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_duplicate_groups_hides_singletons() {
        let groups = group_processes(&[
            record(1, "worker", "worker 1", 1.0),
            record(2, "worker", "worker 2", 1.0),
            record(3, "node", "node", 1.0),
        ]);
        let dups = duplicate_groups(groups.clone(), 2);
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].key, "worker");
        assert_eq!(duplicate_groups(groups, 0).len(), 2);
    }
}
