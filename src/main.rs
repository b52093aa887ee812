//! procsweep - version 0.1.0
//!
//! Process cleaner with tracing logging.
//! This is the main entry point that resolves configuration and dispatches subcommands.

mod cli;
mod commands;
mod config;
mod output;

use clap::Parser;
use tracing::debug;
use tracing::level_filters::LevelFilter;

use cli::{Args, Commands, ListArgs, LogLevel};
use commands::{
    command_check, command_config, command_groups, command_kill, command_list, command_memory,
    command_policy, command_snapshot,
};
use config::{resolve_config, show_config, validate_effective_config, Config};

/// Initializes tracing logging subsystem with configured log level.
///
/// Logs go to stderr so stdout stays machine-readable.
fn setup_logging(level: &LogLevel) {
    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    debug!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

fn run(command: Option<Commands>, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        None => command_list(&ListArgs::default(), config),
        Some(Commands::List(args)) => command_list(&args, config),
        Some(Commands::Groups(args)) => command_groups(&args, config),
        Some(Commands::Kill(args)) => command_kill(&args, config),
        Some(Commands::Memory(args)) => command_memory(&args, config),
        Some(Commands::Snapshot { output }) => command_snapshot(&output, config),
        Some(Commands::Policy { format }) => command_policy(format, config),
        Some(Commands::Check {
            procfs,
            signals,
            all,
        }) => command_check(procfs, signals, all, config),
        Some(Commands::Config {
            output,
            format,
            commented,
        }) => command_config(output, format, commented),
    }
}

/// Main application entry point.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Generating a config file must work even when the current one is broken
    if let Some(Commands::Config {
        output,
        format,
        commented,
    }) = args.command
    {
        return command_config(output, format, commented);
    }

    let config = load_validated_config(&args)?;
    setup_logging(&config.log_level()?);

    if let Err(e) = run(args.command, &config) {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
    Ok(())
}
