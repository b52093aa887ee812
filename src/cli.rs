//! CLI arguments and subcommands for procsweep.
//!
//! This module defines the command-line interface structure using the clap library,
//! including global flags, the shared selection flags and all subcommands.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Output format of list, group, kill and memory views
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    #[value(alias = "md")]
    Markdown,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "procsweep",
    about = "Find and reclaim resources from orphaned, duplicate and runaway processes",
    long_about = "Find and reclaim resources from orphaned, duplicate and runaway processes.\n\n\
                  Lists the processes of a user with orphan, multiplexer and stale-binary \
                  classification, groups duplicate instances of the same program, and kills \
                  selections of them with a preview that matches exactly what would be signalled.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (default: warn)
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Inspect processes of this user instead of the invoking one
    #[arg(short = 'u', long, global = true, conflicts_with = "all_users")]
    pub user: Option<String>,

    /// Inspect processes of every user
    #[arg(long, global = true)]
    pub all_users: bool,

    /// Alternative procfs mount point
    #[arg(long, global = true)]
    pub proc_root: Option<PathBuf>,

    /// Replay a recorded snapshot instead of reading /proc (signals are not delivered)
    #[arg(short = 't', long, global = true)]
    pub snapshot_file: Option<PathBuf>,
}

/// Filter, sort and projection flags shared by `list` and `kill`
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Filter presets (orphans, killable, high-memory, stale), comma-separated
    #[arg(short = 'F', long, value_delimiter = ',')]
    pub filter: Vec<String>,

    /// Only orphan processes (shorthand for --filter=orphans)
    #[arg(short = 'o', long)]
    pub orphans: bool,

    /// Only killable orphan processes (shorthand for --filter=killable)
    #[arg(short = 'k', long)]
    pub killable: bool,

    /// Only high memory processes (shorthand for --filter=high-memory)
    #[arg(short = 'm', long)]
    pub high_memory: bool,

    /// High memory threshold in MB
    #[arg(long)]
    pub high_memory_threshold: Option<f64>,

    /// Minimum memory in MB to include a process
    #[arg(long)]
    pub min_memory: Option<f64>,

    /// Filter by working directory (exact path or glob; no value = current directory)
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pub cwd: Option<String>,

    /// Sort by field (memory, cpu, pid, name, cwd)
    #[arg(short = 's', long)]
    pub sort: Option<String>,

    /// Sort in ascending order (default: descending)
    #[arg(short = 'a', long)]
    pub ascending: bool,

    /// Limit number of results
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Columns to display (comma-separated)
    #[arg(short = 'C', long)]
    pub columns: Option<String>,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ListArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Output format
    #[arg(short = 'f', long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct GroupsArgs {
    /// Output format (table, json)
    #[arg(short = 'f', long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Minimum memory in MB for a process to be grouped
    #[arg(long)]
    pub min_memory: Option<f64>,

    /// Hide groups with fewer members
    #[arg(long, default_value_t = 2)]
    pub min_count: usize,

    /// Limit number of groups
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct KillArgs {
    /// Process IDs to kill (take precedence over filters)
    pub pids: Vec<u32>,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Force kill (SIGKILL instead of SIGTERM)
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Preview what would be killed without killing
    #[arg(long, alias = "dry-run", alias = "dry")]
    pub preview: bool,

    /// Output format for preview and results
    #[arg(short = 'O', long, value_enum)]
    pub output: Option<OutputFormat>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct MemoryArgs {
    /// Output format (table, json)
    #[arg(short = 'f', long, value_enum)]
    pub format: Option<OutputFormat>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List processes (default view)
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show groups of duplicate processes
    #[command(alias = "g")]
    Groups(GroupsArgs),

    /// Kill one or more processes
    Kill(KillArgs),

    /// Show memory summary
    #[command(alias = "mem")]
    Memory(MemoryArgs),

    /// Record the process table and memory counters for later replay
    Snapshot {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long, default_value = "-")]
        output: PathBuf,
    },

    /// Print the effective classification policy
    Policy {
        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,
    },

    /// Validate configuration and system requirements
    Check {
        /// Check the procfs mount
        #[arg(long)]
        procfs: bool,

        /// Check signal delivery permissions
        #[arg(long)]
        signals: bool,

        /// Check all system requirements
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_list_is_optional_and_aliased() {
        let args = Args::parse_from(["procsweep"]);
        assert!(args.command.is_none());

        let args = Args::parse_from(["procsweep", "ls", "-k", "--cwd", "-n", "3"]);
        match args.command {
            Some(Commands::List(list)) => {
                assert!(list.selection.killable);
                assert_eq!(list.selection.cwd.as_deref(), Some(""));
                assert_eq!(list.selection.limit, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_kill_arguments() {
        let args = Args::parse_from([
            "procsweep", "kill", "10", "11", "--dry-run", "-F", "orphans,stale", "-O", "md",
        ]);
        match args.command {
            Some(Commands::Kill(kill)) => {
                assert_eq!(kill.pids, vec![10, 11]);
                assert!(kill.preview);
                assert_eq!(kill.selection.filter, vec!["orphans", "stale"]);
                assert_eq!(kill.output, Some(OutputFormat::Markdown));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_user_conflicts_with_all_users() {
        assert!(Args::try_parse_from(["procsweep", "--user", "a", "--all-users"]).is_err());
    }
}
