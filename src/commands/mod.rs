//! CLI command implementations for procsweep.
//!
//! This module provides implementations for all CLI subcommands:
//! - `list`: Filtered, sorted process listing
//! - `groups`: Duplicate process groups
//! - `kill`: Signal a selection of processes, with preview
//! - `memory`: System memory summary
//! - `snapshot`: Record the process table for replay
//! - `policy`: Effective classification policy
//! - `check`: System validation
//! - `config`: Configuration file generation

pub mod check;
pub mod config;
pub mod groups;
pub mod kill;
pub mod list;
pub mod memory;
pub mod policy;
pub mod snapshot;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use groups::command_groups;
pub use kill::command_kill;
pub use list::command_list;
pub use memory::command_memory;
pub use policy::command_policy;
pub use snapshot::command_snapshot;

use procsweep::error::{SelectionError, SourceError};
use procsweep::pipeline::{parse_columns, Filter, FilterPreset, Selection, SortField, SortOrder};
use procsweep::process::{
    collect, Classifier, MemoryCounters, ProcessIdentity, ProcessRecord, ProcessSource,
    ProcfsSource, RawProcess, SignalDelivery, SignalKind, SnapshotSource,
};
use tracing::{debug, info};

use crate::cli::{OutputFormat, SelectionArgs};
use crate::config::Config;

/// Live procfs or a replayed snapshot, chosen by configuration.
pub enum AnySource {
    Live(ProcfsSource),
    Replay(SnapshotSource),
}

impl AnySource {
    pub fn open(config: &Config) -> Result<Self, SourceError> {
        match &config.snapshot_file {
            Some(path) => {
                info!("Replaying snapshot {}", path.display());
                Ok(AnySource::Replay(SnapshotSource::from_file(path)?))
            }
            None => {
                let root = config.proc_root();
                debug!("Reading live process table from {}", root.display());
                Ok(AnySource::Live(ProcfsSource::new(root)))
            }
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, AnySource::Replay(_))
    }
}

impl ProcessSource for AnySource {
    fn enumerate_processes(&self) -> Vec<RawProcess> {
        match self {
            AnySource::Live(s) => s.enumerate_processes(),
            AnySource::Replay(s) => s.enumerate_processes(),
        }
    }

    fn identify(&self, pid: u32) -> Option<ProcessIdentity> {
        match self {
            AnySource::Live(s) => s.identify(pid),
            AnySource::Replay(s) => s.identify(pid),
        }
    }

    fn read_memory_counters(&self) -> Result<MemoryCounters, SourceError> {
        match self {
            AnySource::Live(s) => s.read_memory_counters(),
            AnySource::Replay(s) => s.read_memory_counters(),
        }
    }

    fn send_signal(&self, pid: u32, signal: SignalKind) -> SignalDelivery {
        match self {
            AnySource::Live(s) => s.send_signal(pid, signal),
            AnySource::Replay(s) => s.send_signal(pid, signal),
        }
    }
}

/// Takes a snapshot for the configured owner.
pub fn snapshot_records<S: ProcessSource>(
    source: &S,
    classifier: &Classifier,
    config: &Config,
) -> Vec<ProcessRecord> {
    collect(source, classifier, &config.owner_filter())
}

/// Preset names from `--filter` plus the shorthand flags, deduplicated in
/// first-seen order.
fn requested_presets(args: &SelectionArgs) -> Result<Vec<FilterPreset>, SelectionError> {
    let mut presets: Vec<FilterPreset> = Vec::new();
    let named = args
        .filter
        .iter()
        .filter(|f| !f.trim().is_empty())
        .map(|f| f.parse::<FilterPreset>())
        .collect::<Result<Vec<_>, _>>()?;

    let flags = [
        (args.orphans, FilterPreset::Orphans),
        (args.killable, FilterPreset::Killable),
        (args.high_memory, FilterPreset::HighMemory),
    ];
    let flagged = flags.iter().filter(|(on, _)| *on).map(|(_, p)| *p);

    for preset in named.into_iter().chain(flagged) {
        if !presets.contains(&preset) {
            presets.push(preset);
        }
    }
    Ok(presets)
}

/// Builds the selection shared by list, kill preview and kill execution.
/// CLI values win over configuration defaults.
pub fn build_selection(args: &SelectionArgs, config: &Config) -> Result<Selection, SelectionError> {
    let threshold = args
        .high_memory_threshold
        .unwrap_or_else(|| config.high_memory_threshold_mb());

    let mut selection = Selection::default();
    for preset in requested_presets(args)? {
        selection = selection.with_filter(Filter::from_preset(preset, threshold)?);
    }
    if let Some(cwd) = &args.cwd {
        selection = selection.with_filter(Filter::cwd(Some(cwd.as_str()))?);
    }
    selection = selection.with_filter(Filter::min_memory(
        args.min_memory.unwrap_or_else(|| config.min_memory_mb()),
    )?);

    let sort = match &args.sort {
        Some(field) => field.parse::<SortField>()?,
        None => config
            .default_sort
            .as_deref()
            .unwrap_or("memory")
            .parse::<SortField>()?,
    };

    let columns = match &args.columns {
        Some(list) => parse_columns(list)?,
        None => match &config.default_columns {
            Some(keys) => parse_columns(&keys.join(","))?,
            None => Vec::new(),
        },
    };

    Ok(selection
        .sorted_by(sort, SortOrder::from_ascending(args.ascending))
        .with_limit(args.limit)
        .with_columns(columns))
}

/// CLI format, else the configured default.
pub fn effective_format(
    requested: Option<OutputFormat>,
    config: &Config,
) -> Result<OutputFormat, Box<dyn std::error::Error>> {
    match requested {
        Some(format) => Ok(format),
        None => config.output_format(),
    }
}
