//! Configuration management for procsweep.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use clap::ValueEnum;
use procsweep::pipeline::{
    parse_columns, Column, Filter, SortField, DEFAULT_COLUMNS, DEFAULT_MIN_MEMORY_MB,
};
use procsweep::process::classifier::HIGH_MEMORY_THRESHOLD_MB;
use procsweep::process::{current_username, ClassifierPolicy, OwnerFilter, DEFAULT_PROC_ROOT};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::{Args, ConfigFormat, LogLevel, OutputFormat};

// Default configuration constants
pub const DEFAULT_PREVIEW_LIMIT: usize = 5;
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Enhanced configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Process source
    pub user: Option<String>,
    #[serde(alias = "all-users")]
    pub all_users: Option<bool>,
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,
    /// Recorded snapshot to replay instead of reading procfs
    #[serde(alias = "snapshot-file")]
    pub snapshot_file: Option<PathBuf>,

    // Selection defaults
    #[serde(alias = "high-memory-threshold-mb")]
    pub high_memory_threshold_mb: Option<f64>,
    #[serde(alias = "min-memory-mb")]
    pub min_memory_mb: Option<f64>,
    #[serde(alias = "default-sort")]
    pub default_sort: Option<String>,
    #[serde(alias = "default-format")]
    pub default_format: Option<String>,
    #[serde(alias = "default-columns")]
    pub default_columns: Option<Vec<String>>,
    /// Rows shown by the kill preview and confirmation prompt
    #[serde(alias = "preview-limit")]
    pub preview_limit: Option<usize>,

    // Classification policy extensions
    #[serde(alias = "extra-system-exe-paths")]
    pub extra_system_exe_paths: Option<Vec<String>>,
    #[serde(alias = "extra-critical-services")]
    pub extra_critical_services: Option<Vec<String>>,
    #[serde(alias = "extra-multiplexer-names")]
    pub extra_multiplexer_names: Option<Vec<String>>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: None,
            all_users: Some(false),
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            snapshot_file: None,
            high_memory_threshold_mb: Some(HIGH_MEMORY_THRESHOLD_MB),
            min_memory_mb: Some(DEFAULT_MIN_MEMORY_MB),
            default_sort: Some("memory".into()),
            default_format: Some("table".into()),
            default_columns: Some(DEFAULT_COLUMNS.iter().map(|c| c.key().to_string()).collect()),
            preview_limit: Some(DEFAULT_PREVIEW_LIMIT),
            extra_system_exe_paths: None,
            extra_critical_services: None,
            extra_multiplexer_names: None,
            log_level: Some(DEFAULT_LOG_LEVEL.into()),
        }
    }
}

impl Config {
    pub fn high_memory_threshold_mb(&self) -> f64 {
        self.high_memory_threshold_mb
            .unwrap_or(HIGH_MEMORY_THRESHOLD_MB)
    }

    pub fn min_memory_mb(&self) -> f64 {
        self.min_memory_mb.unwrap_or(DEFAULT_MIN_MEMORY_MB)
    }

    pub fn preview_limit(&self) -> usize {
        self.preview_limit.unwrap_or(DEFAULT_PREVIEW_LIMIT)
    }

    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }

    pub fn sort_field(&self) -> Result<SortField, Box<dyn std::error::Error>> {
        Ok(self.default_sort.as_deref().unwrap_or("memory").parse()?)
    }

    pub fn output_format(&self) -> Result<OutputFormat, Box<dyn std::error::Error>> {
        let name = self.default_format.as_deref().unwrap_or("table");
        OutputFormat::from_str(name, true).map_err(|_| {
            format!(
                "Invalid default_format '{}', expected table, json, csv or markdown",
                name
            )
            .into()
        })
    }

    pub fn columns(&self) -> Result<Vec<Column>, Box<dyn std::error::Error>> {
        match &self.default_columns {
            Some(keys) if !keys.is_empty() => Ok(parse_columns(&keys.join(","))?),
            _ => Ok(DEFAULT_COLUMNS.to_vec()),
        }
    }

    pub fn log_level(&self) -> Result<LogLevel, Box<dyn std::error::Error>> {
        let name = self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL);
        LogLevel::from_str(name, true).map_err(|_| {
            format!(
                "Invalid log_level '{}', expected off, error, warn, info, debug or trace",
                name
            )
            .into()
        })
    }

    /// Whose processes are inspected: everyone, the configured user, or the
    /// invoking user.
    pub fn owner_filter(&self) -> OwnerFilter {
        if self.all_users.unwrap_or(false) {
            OwnerFilter::AllUsers
        } else {
            OwnerFilter::User(self.user.clone().unwrap_or_else(current_username))
        }
    }

    /// Built-in policy tables extended by the configured entries.
    pub fn classifier_policy(&self) -> ClassifierPolicy {
        ClassifierPolicy::default()
            .with_system_exe_paths(self.extra_system_exe_paths.clone().unwrap_or_default())
            .with_critical_services(self.extra_critical_services.clone().unwrap_or_default())
            .with_multiplexer_names(self.extra_multiplexer_names.clone().unwrap_or_default())
            .with_high_memory_threshold(self.high_memory_threshold_mb())
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    Filter::high_memory(cfg.high_memory_threshold_mb())?;
    Filter::min_memory(cfg.min_memory_mb())?;
    cfg.sort_field()?;
    cfg.output_format()?;
    cfg.columns()?;
    cfg.log_level()?;

    if cfg.preview_limit() == 0 {
        return Err("preview_limit must be at least 1".into());
    }

    if let Some(user) = cfg.user.as_deref() {
        if user.trim().is_empty() {
            return Err("user is set but empty".into());
        }
    }

    if let Some(path) = cfg.snapshot_file.as_deref() {
        if !path.exists() {
            return Err(format!("Snapshot file not found: {}", path.display()).into());
        }
    } else {
        let root = cfg.proc_root();
        if !root.is_dir() {
            return Err(format!("procfs root is not a directory: {}", root.display()).into());
        }
    }

    if let Some(paths) = cfg.extra_system_exe_paths.as_deref() {
        if let Some(bad) = paths.iter().find(|p| !p.starts_with('/')) {
            return Err(format!("extra_system_exe_paths entry '{}' is not absolute", bad).into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(user) = &args.user {
        config.user = Some(user.clone());
        config.all_users = Some(false);
    }
    if args.all_users {
        config.all_users = Some(true);
    }
    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(snapshot) = &args.snapshot_file {
        config.snapshot_file = Some(snapshot.clone());
    }
    if let Some(level) = &args.log_level {
        if let Some(value) = level.to_possible_value() {
            config.log_level = Some(value.get_name().to_string());
        }
    }

    Ok(config)
}

fn default_config_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from("/etc/procsweep/config.yaml")];
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        locations.push(PathBuf::from(xdg).join("procsweep/config.yaml"));
    } else if let Some(home) = std::env::var_os("HOME") {
        locations.push(PathBuf::from(home).join(".config/procsweep/config.yaml"));
    }
    locations.push(PathBuf::from("./procsweep.yaml"));
    locations.push(PathBuf::from("./procsweep.json"));
    locations
}

/// Enhanced configuration loading with multiple format support.
///
/// Without an explicit path the last existing default location wins, so a
/// project-local file overrides the user file, which overrides /etc.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("Config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => match default_config_locations().into_iter().rev().find(|p| p.exists()) {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };

    parse_config_file(&path)
}

fn parse_config_file(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format
pub fn render_config(config: &Config, format: &ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}
