//! Check command implementation.
//!
//! Validates system requirements and configuration.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use procsweep::process::{ProcessSource, ProcfsSource};

use crate::config::{validate_effective_config, Config};

/// Validates system requirements and configuration.
pub fn command_check(
    procfs: bool,
    signals: bool,
    all: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Procsweep - System Check");
    println!("===========================");

    let mut all_ok = true;
    let root = config.proc_root();
    let source = ProcfsSource::new(&root);
    let own_pid = std::process::id();

    // Check procfs
    if procfs || all {
        println!("\n📁 Checking procfs at {}...", root.display());
        if root.is_dir() {
            println!("   ✅ procfs mount accessible");

            let processes = source.enumerate_processes();
            if processes.is_empty() {
                println!("   ❌ Cannot read any process entries");
                all_ok = false;
            } else {
                println!("   ✅ Can read {} process entries", processes.len());
            }

            match processes.iter().find(|p| p.pid == own_pid) {
                Some(me) if me.cwd.is_some() => {
                    println!("   ✅ Own process readable (cwd and exe links resolve)")
                }
                Some(_) => println!("   ⚠️  Own process readable, but cwd link is not"),
                None => {
                    println!("   ❌ Own process {} not found in procfs", own_pid);
                    all_ok = false;
                }
            }

            match source.read_memory_counters() {
                Ok(counters) => println!(
                    "   ✅ meminfo readable: {} MB total",
                    counters.total / 1024 / 1024
                ),
                Err(e) => {
                    println!("   ❌ meminfo unreadable: {}", e);
                    all_ok = false;
                }
            }
        } else {
            println!("   ❌ procfs not found");
            all_ok = false;
        }
    }

    // Check signal permissions
    if signals || all {
        println!("\n📡 Checking signal delivery...");
        match kill(Pid::from_raw(own_pid as i32), None::<Signal>) {
            Ok(()) => println!("   ✅ Signals can be sent to own processes"),
            Err(e) => {
                println!("   ❌ Cannot signal own process: {}", e);
                all_ok = false;
            }
        }
        match kill(Pid::from_raw(1), None::<Signal>) {
            Ok(()) => println!("   ⚠️  Running privileged: other users' processes can be signalled"),
            Err(_) => println!("   ✅ Unprivileged: only own processes can be signalled"),
        }
    }

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
