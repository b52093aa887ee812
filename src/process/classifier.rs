//! Process classification: orphan, killable, high-memory and system-service
//! predicates over a [`ProcessRecord`].
//!
//! The policy tables (system executable directories, critical service names,
//! terminal multiplexer names) are built once into a [`ClassifierPolicy`] and
//! injected into a [`Classifier`]; nothing here reads ambient global state.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};

use crate::process::record::{ProcessRecord, RawProcess};

/// Directories whose binaries belong to the OS rather than the user.
pub const SYSTEM_EXE_PATHS: &[&str] = &["/usr/lib", "/usr/libexec", "/lib", "/usr/sbin", "/sbin"];

/// Processes that must never be offered for termination even when they are
/// parented to init (session managers, audio, shells, remote sessions).
pub const CRITICAL_SERVICES: &[&str] = &[
    // Display/session managers
    "gnome-shell",
    "kwin",
    "kwin_x11",
    "kwin_wayland",
    "plasmashell",
    "mutter",
    "xorg",
    "xwayland",
    // Audio
    "pipewire",
    "pipewire-pulse",
    "wireplumber",
    "pulseaudio",
    // Remote sessions
    "tmux",
    "tmux: server",
    "screen",
    "zellij",
    "mosh-server",
    // Shells
    "zsh",
    "-zsh",
    "bash",
    "-bash",
    "fish",
    "-fish",
    "ssh",
    "sshd",
    "ssh-agent",
    "gpg-agent",
    // Init and kernel
    "systemd",
    "init",
    "kthreadd",
    "dbus-daemon",
    "dbus-broker",
    // Desktop services
    "ibus-daemon",
    "gjs",
    "gnome-keyring-daemon",
];

/// Server process names of terminal multiplexers.
pub const MULTIPLEXER_NAMES: &[&str] = &["tmux: server", "tmux", "screen", "zellij"];

/// Longest process name the kernel reports in `stat`.
pub const COMM_MAX_LEN: usize = 15;

/// Default RSS threshold for the high-memory predicate.
pub const HIGH_MEMORY_THRESHOLD_MB: f64 = 500.0;

/// Lookup table of every enumerated process by pid, used for ancestry walks.
pub type ProcessIndex<'a> = HashMap<u32, &'a RawProcess>;

/// Immutable classification policy.
#[derive(Debug, Clone)]
pub struct ClassifierPolicy {
    system_exe_paths: Vec<String>,
    critical_services: HashSet<String>,
    multiplexer_names: HashSet<String>,
    high_memory_threshold_mb: f64,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            system_exe_paths: SYSTEM_EXE_PATHS.iter().map(|s| s.to_string()).collect(),
            critical_services: CRITICAL_SERVICES.iter().map(|s| s.to_lowercase()).collect(),
            multiplexer_names: MULTIPLEXER_NAMES.iter().map(|s| s.to_lowercase()).collect(),
            high_memory_threshold_mb: HIGH_MEMORY_THRESHOLD_MB,
        }
    }
}

impl ClassifierPolicy {
    /// Adds directories to the system executable allow-list.
    pub fn with_system_exe_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for path in paths {
            let path = path.into();
            if !path.is_empty() && !self.system_exe_paths.contains(&path) {
                self.system_exe_paths.push(path);
            }
        }
        self
    }

    pub fn with_critical_services<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.critical_services
            .extend(names.into_iter().map(|n| n.as_ref().to_lowercase()));
        self
    }

    pub fn with_multiplexer_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.multiplexer_names
            .extend(names.into_iter().map(|n| n.as_ref().to_lowercase()));
        self
    }

    pub fn with_high_memory_threshold(mut self, threshold_mb: f64) -> Self {
        self.high_memory_threshold_mb = threshold_mb;
        self
    }

    pub fn system_exe_paths(&self) -> &[String] {
        &self.system_exe_paths
    }

    /// Critical service names, sorted.
    pub fn critical_services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.critical_services.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Multiplexer server names, sorted.
    pub fn multiplexer_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.multiplexer_names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn high_memory_threshold_mb(&self) -> f64 {
        self.high_memory_threshold_mb
    }
}

/// `ppid == 1` and not part of a terminal multiplexer session.
pub fn is_orphan(p: &ProcessRecord) -> bool {
    p.ppid == 1 && !p.in_tmux
}

/// Strictly above the threshold.
pub fn is_high_memory(p: &ProcessRecord, threshold_mb: f64) -> bool {
    p.rss_mb > threshold_mb
}

/// Compact status label: the raw state (or `stale` when the backing binary
/// was deleted) followed by `[orphan]` / `[tmux]` flags.
pub fn display_status(p: &ProcessRecord) -> String {
    let mut label = if p.exe_deleted {
        "stale".to_string()
    } else {
        p.status.as_str().to_string()
    };
    if is_orphan(p) {
        label.push_str(" [orphan]");
    }
    if p.in_tmux {
        label.push_str(" [tmux]");
    }
    label
}

/// Policy-aware predicates.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    policy: ClassifierPolicy,
}

impl Classifier {
    pub fn new(policy: ClassifierPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ClassifierPolicy {
        &self.policy
    }

    pub fn is_orphan(&self, p: &ProcessRecord) -> bool {
        is_orphan(p)
    }

    /// Uses the policy's default threshold.
    pub fn is_high_memory(&self, p: &ProcessRecord) -> bool {
        is_high_memory(p, self.policy.high_memory_threshold_mb)
    }

    /// Executable lives under a system directory, or the name is a known
    /// critical service. Without a readable exe link the first command-line
    /// token stands in for the executable path.
    pub fn is_system_service(&self, p: &ProcessRecord) -> bool {
        let exe = p
            .exe_path
            .as_deref()
            .filter(|e| !e.is_empty())
            .or_else(|| p.cmdline.split_whitespace().next());

        if let Some(exe) = exe {
            if self
                .policy
                .system_exe_paths
                .iter()
                .any(|dir| exe.starts_with(dir.as_str()))
            {
                return true;
            }
            let basename = exe.rsplit('/').next().unwrap_or(exe).to_lowercase();
            if self.policy.critical_services.contains(&basename) {
                return true;
            }
        }

        let name = p.name.to_lowercase();
        if self.policy.critical_services.contains(&name) {
            return true;
        }

        // The kernel cuts comm to 15 bytes, so a full-length name may be the
        // prefix of a longer service name.
        name.len() == COMM_MAX_LEN
            && self
                .policy
                .critical_services
                .iter()
                .any(|service| service.starts_with(name.as_str()))
    }

    /// The only predicate that authorizes destructive action.
    pub fn is_killable(&self, p: &ProcessRecord) -> bool {
        is_orphan(p) && !p.in_tmux && !self.is_system_service(p)
    }

    pub fn is_multiplexer(&self, name: &str) -> bool {
        self.policy.multiplexer_names.contains(&name.to_lowercase())
    }

    /// Walks from `pid` up the parent chain looking for a multiplexer server,
    /// the process itself included. A missing link or a cycle ends the walk
    /// with `false`.
    pub fn in_multiplexer_session(&self, pid: u32, index: &ProcessIndex<'_>) -> bool {
        let mut current = pid;
        // Any chain longer than the table must be revisiting pids.
        for _ in 0..=index.len() {
            let Some(entry) = index.get(&current) else {
                return false;
            };
            if self.is_multiplexer(&entry.name) {
                return true;
            }
            if entry.ppid == 0 || entry.ppid == current {
                return false;
            }
            current = entry.ppid;
        }
        false
    }
}
