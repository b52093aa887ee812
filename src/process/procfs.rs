//! Linux process source reading the /proc filesystem.
//!
//! The procfs root is configurable so the readers can be pointed at a fake
//! tree in tests. Signals always go to the real kernel through `nix`.

use ahash::AHashMap as HashMap;
use anyhow::{anyhow, bail, Context};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::{getuid, Pid, Uid, User};
use once_cell::sync::Lazy;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::process::record::{ProcessIdentity, ProcessStatus, RawProcess};
use crate::process::source::{MemoryCounters, ProcessSource, SignalDelivery, SignalKind};

pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Suffix the kernel appends to `/proc/<pid>/exe` once the binary is unlinked.
const DELETED_SUFFIX: &str = " (deleted)";

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    // SAFETY: sysconf is safe to call with _SC_CLK_TCK
    // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
    let tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if tck > 0 {
        return tck as f64;
    }
    100.0
}

fn get_page_size() -> u64 {
    // SAFETY: sysconf is safe to call with _SC_PAGESIZE
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        return size as u64;
    }
    4096
}

/// System clock ticks per second (for CPU and start time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Memory page size in bytes (for RSS calculation).
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(get_page_size);

/// Fields of `/proc/<pid>/stat` the collector needs.
#[derive(Debug, Clone, PartialEq)]
pub struct StatFields {
    pub name: String,
    pub state: char,
    pub ppid: u32,
    /// utime + stime, in clock ticks.
    pub cpu_ticks: u64,
    /// Start time after boot, in clock ticks.
    pub start_ticks: u64,
    pub rss_pages: u64,
}

/// Parses `/proc/<pid>/stat`.
///
/// The comm field may itself contain spaces and parentheses, so it is taken
/// as everything between the first `(` and the last `)`.
pub fn parse_stat(content: &str) -> anyhow::Result<StatFields> {
    let open = content.find('(').ok_or_else(|| anyhow!("missing '(' in stat"))?;
    let close = content.rfind(')').ok_or_else(|| anyhow!("missing ')' in stat"))?;
    if close < open {
        bail!("malformed comm field in stat");
    }

    let name = content[open + 1..close].to_string();
    // rest[0] is field 3 (state); field N lives at rest[N - 3]
    let rest: Vec<&str> = content[close + 1..].split_whitespace().collect();
    if rest.len() < 22 {
        bail!("expected at least 24 stat fields, got {}", rest.len() + 2);
    }

    let state = rest[0].chars().next().unwrap_or('?');
    let ppid: u32 = rest[1].parse().context("invalid ppid field")?;
    let utime: u64 = rest[11].parse().context("invalid utime field")?;
    let stime: u64 = rest[12].parse().context("invalid stime field")?;
    let start_ticks: u64 = rest[19].parse().context("invalid starttime field")?;
    let rss_pages: u64 = rest[21].parse().unwrap_or(0);

    Ok(StatFields {
        name,
        state,
        ppid,
        cpu_ticks: utime + stime,
        start_ticks,
        rss_pages,
    })
}

/// Real uid from the `Uid:` line of `/proc/<pid>/status`.
pub fn parse_status_uid(content: &str) -> Option<u32> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|v| v.split_whitespace().next())
        .and_then(|v| v.parse().ok())
}

/// Boot time (epoch seconds) from the `btime` line of `/proc/stat`.
pub fn parse_boot_time(content: &str) -> Option<u64> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("btime "))
        .and_then(|v| v.trim().parse().ok())
}

/// Parses kilobyte values from meminfo lines.
pub fn parse_kb_value(v: &str) -> Option<u64> {
    v.split_whitespace().next()?.parse().ok()
}

/// Parses `/proc/meminfo` into memory counters.
///
/// `free` is MemAvailable (MemFree on kernels that predate it), so `used`
/// excludes reclaimable page cache.
pub fn parse_meminfo(content: &str) -> Result<MemoryCounters, String> {
    let mut total: Option<u64> = None;
    let mut available: Option<u64> = None;
    let mut mem_free: Option<u64> = None;
    let mut swap_total: Option<u64> = None;
    let mut swap_free: Option<u64> = None;

    for line in content.lines() {
        if let Some(v) = line.strip_prefix("MemTotal:") {
            total = parse_kb_value(v);
        } else if let Some(v) = line.strip_prefix("MemAvailable:") {
            available = parse_kb_value(v);
        } else if let Some(v) = line.strip_prefix("MemFree:") {
            mem_free = parse_kb_value(v);
        } else if let Some(v) = line.strip_prefix("SwapTotal:") {
            swap_total = parse_kb_value(v);
        } else if let Some(v) = line.strip_prefix("SwapFree:") {
            swap_free = parse_kb_value(v);
        }
    }

    let total_kb = total.ok_or("MemTotal missing")?;
    let free_kb = available
        .or(mem_free)
        .ok_or("neither MemAvailable nor MemFree present")?
        .min(total_kb);
    let swap_total_kb = swap_total.unwrap_or(0);
    let swap_free_kb = swap_free.unwrap_or(swap_total_kb).min(swap_total_kb);

    Ok(MemoryCounters {
        total: total_kb * 1024,
        used: (total_kb - free_kb) * 1024,
        free: free_kb * 1024,
        swap_total: swap_total_kb * 1024,
        swap_used: (swap_total_kb - swap_free_kb) * 1024,
    })
}

/// Reads a NUL-separated `/proc/<pid>/cmdline` into a single space-joined line.
fn read_cmdline(path: &Path) -> String {
    match fs::read(path) {
        Ok(content) => content
            .split(|&b| b == 0u8)
            .filter(|part| !part.is_empty())
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect::<Vec<_>>()
            .join(" "),
        Err(_) => String::new(),
    }
}

fn read_link_string(path: &Path) -> Option<String> {
    fs::read_link(path)
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}

/// Splits a raw exe link into the binary path and whether it was deleted.
pub fn split_exe_link(link: &str) -> (String, bool) {
    match link.strip_suffix(DELETED_SUFFIX) {
        Some(path) => (path.to_string(), true),
        None => (link.to_string(), false),
    }
}

fn has_tmux_env(proc_path: &Path) -> bool {
    match fs::read(proc_path.join("environ")) {
        Ok(content) => content
            .split(|&b| b == 0u8)
            .any(|var| var.starts_with(b"TMUX=")),
        Err(_) => false,
    }
}

fn resolve_username(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        _ => uid.to_string(),
    }
}

/// Name of the user running this program.
pub fn current_username() -> String {
    resolve_username(getuid().as_raw())
}

fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Process source reading a procfs tree.
#[derive(Debug, Clone)]
pub struct ProcfsSource {
    root: PathBuf,
    boot_time: f64,
}

impl ProcfsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let boot_time = match fs::read_to_string(root.join("stat")) {
            Ok(content) => parse_boot_time(&content).unwrap_or(0) as f64,
            Err(e) => {
                warn!(
                    "Failed to read boot time from {}: {}",
                    root.join("stat").display(),
                    e
                );
                0.0
            }
        };
        debug!("Procfs source at {} (btime={})", root.display(), boot_time);
        Self { root, boot_time }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn create_time(&self, stat: &StatFields) -> f64 {
        self.boot_time + stat.start_ticks as f64 / *CLK_TCK
    }

    fn read_stat(&self, proc_path: &Path) -> anyhow::Result<StatFields> {
        let stat_path = proc_path.join("stat");
        let content = fs::read_to_string(&stat_path)
            .with_context(|| format!("reading {}", stat_path.display()))?;
        parse_stat(&content).with_context(|| format!("parsing {}", stat_path.display()))
    }

    fn read_process(
        &self,
        pid: u32,
        users: &mut HashMap<u32, String>,
        now: f64,
    ) -> anyhow::Result<RawProcess> {
        let proc_path = self.root.join(pid.to_string());
        let stat = self.read_stat(&proc_path)?;

        let status_path = proc_path.join("status");
        let status = fs::read_to_string(&status_path)
            .with_context(|| format!("reading {}", status_path.display()))?;
        let uid = parse_status_uid(&status)
            .ok_or_else(|| anyhow!("no Uid line in {}", status_path.display()))?;
        let username = users
            .entry(uid)
            .or_insert_with(|| resolve_username(uid))
            .clone();

        let (exe_path, exe_deleted) = match read_link_string(&proc_path.join("exe")) {
            Some(link) => {
                let (path, deleted) = split_exe_link(&link);
                (Some(path), deleted)
            }
            None => (None, false),
        };

        let create_time = self.create_time(&stat);
        let age = now - create_time;
        let cpu_percent = if age > 0.0 {
            (stat.cpu_ticks as f64 / *CLK_TCK) / age * 100.0
        } else {
            0.0
        };

        // Only orphan candidates need the (comparatively large) environ read.
        let tmux_env = stat.ppid == 1 && has_tmux_env(&proc_path);

        Ok(RawProcess {
            pid,
            ppid: stat.ppid,
            cmdline: read_cmdline(&proc_path.join("cmdline")),
            cwd: read_link_string(&proc_path.join("cwd")),
            exe_path,
            exe_deleted,
            rss_bytes: stat.rss_pages * *PAGE_SIZE,
            cpu_percent,
            username,
            create_time,
            status: ProcessStatus::from_state_char(stat.state),
            tmux_env,
            name: stat.name,
        })
    }
}

impl Default for ProcfsSource {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcessSource for ProcfsSource {
    fn enumerate_processes(&self) -> Vec<RawProcess> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to list {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };

        let now = epoch_now();
        let mut users: HashMap<u32, String> = HashMap::new();
        let mut out = Vec::new();

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let pid: u32 = match file_name.to_str().and_then(|s| s.parse().ok()) {
                Some(v) => v,
                None => continue,
            };
            match self.read_process(pid, &mut users, now) {
                Ok(raw) => out.push(raw),
                // Exited between listing and reading, or not ours to read.
                Err(e) => debug!("Skipping pid {}: {:#}", pid, e),
            }
        }

        debug!("Enumerated {} processes from {}", out.len(), self.root.display());
        out
    }

    fn identify(&self, pid: u32) -> Option<ProcessIdentity> {
        let proc_path = self.root.join(pid.to_string());
        match self.read_stat(&proc_path) {
            Ok(stat) => Some(ProcessIdentity {
                pid,
                create_time: self.create_time(&stat),
            }),
            Err(e) => {
                debug!("pid {} not found: {:#}", pid, e);
                None
            }
        }
    }

    fn read_memory_counters(&self) -> Result<MemoryCounters, SourceError> {
        let path = self.root.join("meminfo");
        let content = fs::read_to_string(&path).map_err(|source| SourceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_meminfo(&content).map_err(|reason| SourceError::Parse {
            path: path.display().to_string(),
            reason,
        })
    }

    fn send_signal(&self, pid: u32, signal: SignalKind) -> SignalDelivery {
        // kill(2) treats 0 and negative pids as process groups.
        if pid == 0 || pid > i32::MAX as u32 {
            return SignalDelivery::Failed(format!("refusing to signal pid {}", pid));
        }

        let sig = match signal {
            SignalKind::Terminate => Signal::SIGTERM,
            SignalKind::Kill => Signal::SIGKILL,
        };

        match signal::kill(Pid::from_raw(pid as i32), sig) {
            Ok(()) => SignalDelivery::Delivered,
            Err(Errno::ESRCH) => SignalDelivery::NotFound,
            Err(Errno::EPERM) => SignalDelivery::PermissionDenied,
            Err(e) => SignalDelivery::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    const STAT_LINE: &str = "1234 (test_process) S 1 1234 1234 0 -1 4194304 100 0 0 0 1000 500 0 0 20 0 1 0 12345 12345678 256 18446744073709551615 4194304 4238788 140736466511168 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0";

    fn write_proc_entry(root: &Path, pid: u32, stat: &str, uid: u32) -> PathBuf {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(&dir).expect("create pid dir");
        fs::write(dir.join("stat"), stat).expect("write stat");
        fs::write(
            dir.join("status"),
            format!("Name:\ttest\nState:\tS (sleeping)\nUid:\t{uid}\t{uid}\t{uid}\t{uid}\n"),
        )
        .expect("write status");
        dir
    }

    // -------------------------------------------------------------------------
    // Tests for parse_stat
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_stat_fields() {
        let stat = parse_stat(STAT_LINE).expect("valid stat");
        assert_eq!(stat.name, "test_process");
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.ppid, 1);
        assert_eq!(stat.cpu_ticks, 1500);
        assert_eq!(stat.start_ticks, 12345);
        assert_eq!(stat.rss_pages, 256);
    }

    #[test]
    fn test_parse_stat_comm_with_spaces_and_parens() {
        let line = STAT_LINE.replace("(test_process)", "(tmux: server (x))");
        let stat = parse_stat(&line).expect("valid stat");
        assert_eq!(stat.name, "tmux: server (x)");
        assert_eq!(stat.ppid, 1);
    }

    #[test]
    fn test_parse_stat_too_short() {
        assert!(parse_stat("1234 (test) S 1 2 3").is_err());
        assert!(parse_stat("garbage").is_err());
    }

    // -------------------------------------------------------------------------
    // Tests for small parsers
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_status_uid() {
        let status = "Name:\tbash\nUid:\t1000\t1001\t1000\t1000\nGid:\t1000\n";
        assert_eq!(parse_status_uid(status), Some(1000));
        assert_eq!(parse_status_uid("Name:\tbash\n"), None);
    }

    #[test]
    fn test_parse_boot_time() {
        let stat = "cpu  1 2 3 4\nintr 5\nbtime 1700000000\nprocesses 42\n";
        assert_eq!(parse_boot_time(stat), Some(1_700_000_000));
        assert_eq!(parse_boot_time("cpu 1 2 3\n"), None);
    }

    #[test]
    fn test_split_exe_link() {
        assert_eq!(
            split_exe_link("/usr/bin/node (deleted)"),
            ("/usr/bin/node".to_string(), true)
        );
        assert_eq!(
            split_exe_link("/usr/bin/node"),
            ("/usr/bin/node".to_string(), false)
        );
    }

    #[test]
    fn test_parse_meminfo() {
        let content = "MemTotal:       16000000 kB\nMemFree:         1000000 kB\nMemAvailable:    4000000 kB\nSwapTotal:       2000000 kB\nSwapFree:        1500000 kB\n";
        let counters = parse_meminfo(content).expect("valid meminfo");
        assert_eq!(counters.total, 16_000_000 * 1024);
        assert_eq!(counters.free, 4_000_000 * 1024);
        assert_eq!(counters.used, 12_000_000 * 1024);
        assert_eq!(counters.swap_total, 2_000_000 * 1024);
        assert_eq!(counters.swap_used, 500_000 * 1024);
    }

    #[test]
    fn test_parse_meminfo_without_available_or_swap() {
        let counters = parse_meminfo("MemTotal: 1000 kB\nMemFree: 250 kB\n").expect("valid");
        assert_eq!(counters.free, 250 * 1024);
        assert_eq!(counters.used, 750 * 1024);
        assert_eq!(counters.swap_total, 0);
        assert_eq!(counters.swap_used, 0);
        assert!(parse_meminfo("SwapTotal: 0 kB\n").is_err());
    }

    // -------------------------------------------------------------------------
    // Tests for ProcfsSource against a fake procfs tree
    // -------------------------------------------------------------------------

    #[test]
    fn test_enumerate_reads_fake_tree() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        fs::write(root.join("stat"), "cpu 1 2 3 4\nbtime 1700000000\n").expect("write stat");

        let proc_dir = write_proc_entry(root, 1234, STAT_LINE, 0);
        fs::write(proc_dir.join("cmdline"), b"node\0server.js\0--port\08080\0").expect("cmdline");
        fs::write(proc_dir.join("environ"), b"HOME=/root\0TMUX=/tmp/tmux-0/default,1,0\0")
            .expect("environ");
        symlink("/srv/app", proc_dir.join("cwd")).expect("cwd link");
        symlink("/usr/bin/node (deleted)", proc_dir.join("exe")).expect("exe link");

        // Not a pid, and a pid whose stat vanished mid-scan.
        fs::create_dir_all(root.join("self_not_pid")).expect("mkdir");
        fs::create_dir_all(root.join("999")).expect("mkdir");

        let source = ProcfsSource::new(root);
        let procs = source.enumerate_processes();
        assert_eq!(procs.len(), 1);

        let p = &procs[0];
        assert_eq!(p.pid, 1234);
        assert_eq!(p.ppid, 1);
        assert_eq!(p.name, "test_process");
        assert_eq!(p.cmdline, "node server.js --port 8080");
        assert_eq!(p.cwd.as_deref(), Some("/srv/app"));
        assert_eq!(p.exe_path.as_deref(), Some("/usr/bin/node"));
        assert!(p.exe_deleted);
        assert!(p.tmux_env);
        assert_eq!(p.status, ProcessStatus::Sleeping);
        assert_eq!(p.rss_bytes, 256 * *PAGE_SIZE);
        let expected_start = 1_700_000_000.0 + 12345.0 / *CLK_TCK;
        assert!((p.create_time - expected_start).abs() < 0.001);
        assert!(p.cpu_percent >= 0.0);
    }

    #[test]
    fn test_truncated_comm_of_critical_service_is_not_killable() {
        use crate::pipeline::{Filter, Selection};
        use crate::process::classifier::Classifier;
        use crate::process::collector::{collect, OwnerFilter};

        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        fs::write(root.join("stat"), "cpu 1 2 3 4\nbtime 1700000000\n").expect("write stat");
        let line = STAT_LINE.replace("1234 (test_process)", "4242 (gnome-keyring-d)");
        let proc_dir = write_proc_entry(root, 4242, &line, 0);
        symlink("/usr/bin/gnome-keyring-daemon", proc_dir.join("exe")).expect("exe link");

        let classifier = Classifier::default();
        let records = collect(&ProcfsSource::new(root), &classifier, &OwnerFilter::AllUsers);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "gnome-keyring-d");
        assert!(records[0].is_orphan);
        assert!(classifier.is_system_service(&records[0]));

        let killable = Selection::default()
            .with_filter(Filter::Killable)
            .select(&classifier, &records);
        assert!(killable.is_empty());
    }

    #[test]
    fn test_enumerate_unreadable_links_are_absent() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let line = STAT_LINE.replace(" S 1 ", " R 77 ");
        write_proc_entry(root, 1234, &line, 0);

        let source = ProcfsSource::new(root);
        let procs = source.enumerate_processes();
        assert_eq!(procs.len(), 1);
        assert_eq!(procs[0].ppid, 77);
        assert_eq!(procs[0].cwd, None);
        assert_eq!(procs[0].exe_path, None);
        assert!(!procs[0].exe_deleted);
        assert!(!procs[0].tmux_env);
        assert_eq!(procs[0].cmdline, "");
    }

    #[test]
    fn test_identify_and_memory_counters() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        write_proc_entry(root, 1234, STAT_LINE, 0);
        fs::write(root.join("meminfo"), "MemTotal: 2048 kB\nMemAvailable: 1024 kB\n")
            .expect("meminfo");

        let source = ProcfsSource::new(root);
        assert_eq!(source.identify(1234).map(|id| id.pid), Some(1234));
        assert!(source.identify(4321).is_none());

        let counters = source.read_memory_counters().expect("meminfo readable");
        assert_eq!(counters.total, 2048 * 1024);
        assert_eq!(counters.used, 1024 * 1024);
    }

    #[test]
    fn test_missing_meminfo_is_source_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        let source = ProcfsSource::new(dir.path());
        assert!(matches!(
            source.read_memory_counters(),
            Err(SourceError::Io { .. })
        ));
    }

    #[test]
    fn test_send_signal_refuses_group_pids() {
        let source = ProcfsSource::default();
        assert!(matches!(
            source.send_signal(0, SignalKind::Terminate),
            SignalDelivery::Failed(_)
        ));
        assert!(matches!(
            source.send_signal(u32::MAX, SignalKind::Kill),
            SignalDelivery::Failed(_)
        ));
    }
}
