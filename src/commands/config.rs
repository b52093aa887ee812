//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from(match format {
            ConfigFormat::Json => "procsweep.json",
            ConfigFormat::Toml => "procsweep.toml",
            ConfigFormat::Yaml => "procsweep.yaml",
        }),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Procsweep Configuration
# =======================
#
# Process Source
# --------------
# user: null                     # Inspect this user's processes (null = invoking user)
# all_users: false               # Inspect every user's processes
# proc_root: "/proc"             # procfs mount point
# snapshot_file: null            # Replay a recorded snapshot instead of procfs
#
# Selection Defaults
# ------------------
# high_memory_threshold_mb: 500  # RSS above which a process is high-memory (strict)
# min_memory_mb: 5               # Hide processes below this RSS
# default_sort: "memory"         # memory, cpu, pid, name, cwd
# default_format: "table"        # table, json, csv, markdown
# default_columns: [pid, name, rss_mb, cpu_percent, cwd, ppid, status]
# preview_limit: 5               # Rows shown by kill preview and confirmation
#
# Classification Policy
# ---------------------
# extra_system_exe_paths: []     # Directories whose binaries are never killable
# extra_critical_services: []    # Process names that are never killable
# extra_multiplexer_names: []    # Additional terminal multiplexer server names
#
# Logging
# -------
# log_level: "warn"              # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generated_config_loads_back() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("procsweep.yaml");
        command_config(Some(path.clone()), ConfigFormat::Yaml, true).expect("write");

        let content = fs::read_to_string(&path).expect("read");
        assert!(content.starts_with("# Procsweep Configuration"));

        let loaded = crate::config::load_config(Some(&path)).expect("load");
        assert_eq!(loaded.preview_limit(), 5);
        assert_eq!(loaded.default_sort.as_deref(), Some("memory"));
    }
}
