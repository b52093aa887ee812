//! Kill command implementation.
//!
//! Resolves the targets once, then either previews them or asks for
//! confirmation and signals exactly those targets.

use procsweep::actions::{plan_kill, KillExecutor, KillPlan, KillRequest};
use procsweep::process::{collect, OwnerFilter};
use procsweep::Classifier;
use std::io::{self, IsTerminal, Write};
use tracing::warn;

use super::{build_selection, effective_format, snapshot_records, AnySource};
use crate::cli::KillArgs;
use crate::config::Config;
use crate::output::{format_kill_results, format_preview};

/// Kills explicit pids or the processes matching the selection flags.
pub fn command_kill(args: &KillArgs, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let selection = build_selection(&args.selection, config)?;
    let format = effective_format(args.output, config)?;
    let request = KillRequest {
        pids: args.pids.clone(),
        selection,
    };

    let source = AnySource::open(config)?;
    let classifier = Classifier::new(config.classifier_policy());
    // Explicit pids may belong to any user; the signal itself decides.
    let records = if request.pids.is_empty() {
        snapshot_records(&source, &classifier, config)
    } else {
        collect(&source, &classifier, &OwnerFilter::AllUsers)
    };

    let plan = plan_kill(&request, &classifier, &records)?;
    if plan.is_empty() {
        println!("No processes to kill");
        return Ok(());
    }

    if args.preview {
        let targets = plan.records();
        let rows = request.selection.project(&targets);
        println!(
            "{}",
            format_preview(
                &plan,
                &rows,
                &request.selection.columns,
                format,
                config.preview_limit()
            )?
        );
        return Ok(());
    }

    if !args.yes && !confirm_kill(&plan, args.force, config.preview_limit())? {
        println!("Cancelled");
        return Ok(());
    }

    if source.is_replay() {
        warn!("Replaying a snapshot: signals are recorded, not delivered");
    }

    let result = KillExecutor::new(&source).execute(&plan, args.force);
    println!("{}", format_kill_results(&result, format)?);
    Ok(())
}

/// Asks before signalling. Without a terminal on stdin there is nobody to
/// ask and the kill proceeds.
fn confirm_kill(plan: &KillPlan, force: bool, limit: usize) -> Result<bool, Box<dyn std::error::Error>> {
    if !io::stdin().is_terminal() {
        return Ok(true);
    }

    let action = if force { "Force kill" } else { "Kill" };
    println!(
        "{} {} process(es)? Will free ~{:.1} MB",
        action,
        plan.len(),
        plan.projected_free_mb()
    );

    for target in plan.targets.iter().take(limit) {
        println!(
            "  PID {} - {} ({:.1} MB)",
            target.pid,
            target.name(),
            target.rss_mb()
        );
    }
    if plan.len() > limit {
        println!("  ... and {} more", plan.len() - limit);
    }

    print!("\nContinue? [y/N] ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_lowercase();

    Ok(input == "y" || input == "yes")
}
