//! List command implementation.
//!
//! Prints the filtered, sorted process list.

use procsweep::Classifier;
use tracing::debug;

use super::{build_selection, effective_format, snapshot_records, AnySource};
use crate::cli::ListArgs;
use crate::config::Config;
use crate::output::format_records;

/// Lists the processes matching the selection flags.
pub fn command_list(args: &ListArgs, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let selection = build_selection(&args.selection, config)?;
    let format = effective_format(args.format, config)?;

    let source = AnySource::open(config)?;
    let classifier = Classifier::new(config.classifier_policy());
    let records = snapshot_records(&source, &classifier, config);

    let selected = selection.select(&classifier, &records);
    debug!("{} of {} processes selected", selected.len(), records.len());

    let rows = selection.project(&selected);
    println!("{}", format_records(&rows, &selection.columns, format)?);
    Ok(())
}
