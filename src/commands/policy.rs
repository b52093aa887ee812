//! Policy command implementation.
//!
//! Prints the classification policy in effect after configuration
//! extensions are applied.

use procsweep::process::ClassifierPolicy;
use serde::Serialize;

use crate::cli::ConfigFormat;
use crate::config::Config;

#[derive(Debug, Serialize)]
struct PolicyView<'a> {
    high_memory_threshold_mb: f64,
    system_exe_paths: &'a [String],
    critical_services: Vec<&'a str>,
    multiplexer_names: Vec<&'a str>,
}

impl<'a> From<&'a ClassifierPolicy> for PolicyView<'a> {
    fn from(policy: &'a ClassifierPolicy) -> Self {
        Self {
            high_memory_threshold_mb: policy.high_memory_threshold_mb(),
            system_exe_paths: policy.system_exe_paths(),
            critical_services: policy.critical_services(),
            multiplexer_names: policy.multiplexer_names(),
        }
    }
}

fn render_policy(policy: &ClassifierPolicy, format: &ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    let view = PolicyView::from(policy);
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&view)?,
        ConfigFormat::Toml => toml::to_string_pretty(&view)?,
        ConfigFormat::Yaml => serde_yaml::to_string(&view)?,
    })
}

/// Prints the effective classifier policy.
pub fn command_policy(format: ConfigFormat, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_policy(&config.classifier_policy(), &format)?);
    Ok(())
}
