//! Memory command implementation.

use procsweep::read_memory_summary;

use super::{effective_format, AnySource};
use crate::cli::MemoryArgs;
use crate::config::Config;
use crate::output::format_memory;

/// Prints the system memory and swap summary.
pub fn command_memory(args: &MemoryArgs, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let format = effective_format(args.format, config)?;
    let source = AnySource::open(config)?;
    let summary = read_memory_summary(&source)?;
    println!("{}", format_memory(&summary, format)?);
    Ok(())
}
