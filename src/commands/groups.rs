//! Groups command implementation.
//!
//! Shows duplicate instances of the same program with their total memory.

use procsweep::pipeline::Filter;
use procsweep::process::{duplicate_groups, group_processes, ProcessRecord};
use procsweep::Classifier;

use super::{effective_format, snapshot_records, AnySource};
use crate::cli::GroupsArgs;
use crate::config::Config;
use crate::output::format_groups;

/// Prints process groups with at least `--min-count` members.
pub fn command_groups(args: &GroupsArgs, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let format = effective_format(args.format, config)?;
    let floor = Filter::min_memory(args.min_memory.unwrap_or_else(|| config.min_memory_mb()))?;

    let source = AnySource::open(config)?;
    let classifier = Classifier::new(config.classifier_policy());
    let records: Vec<ProcessRecord> = snapshot_records(&source, &classifier, config)
        .into_iter()
        .filter(|r| floor.matches(&classifier, r))
        .collect();

    let mut groups = duplicate_groups(group_processes(&records), args.min_count);
    if let Some(limit) = args.limit {
        groups.truncate(limit);
    }

    println!("{}", format_groups(&groups, format)?);
    Ok(())
}
