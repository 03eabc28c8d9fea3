//! Configuration commands.

use std::path::Path;

use crate::config::FeedcalConfig;
use crate::error::{ClientError, ClientResult};
use crate::rules::{load_rules_file, resolve_rules_path};

/// Dump the current configuration to stdout.
pub fn dump(config: &FeedcalConfig) -> ClientResult<()> {
    println!("{}", render(config)?);
    Ok(())
}

fn render(config: &FeedcalConfig) -> ClientResult<String> {
    toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))
}

/// Validate the configuration, including the rules file and credentials.
pub fn validate(config: &FeedcalConfig, config_path: &Path) -> ClientResult<()> {
    config.validate()?;

    if let Some(ref rules_file) = config.sync.rules_file {
        let path = resolve_rules_path(rules_file, config_path);
        let loaded = load_rules_file(&path)?;
        println!(
            "Rules file {}: {} rules, {} skipped rows.",
            path.display(),
            loaded.rules.len(),
            loaded.skipped.len()
        );
    }

    #[cfg(feature = "google")]
    if let Some(ref google) = config.google
        && (google.client_id.is_some() || google.client_secret.is_some())
    {
        google.to_store_config()?;
        println!("Google credentials are valid.");
    }

    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path(config_path: &Path) -> ClientResult<()> {
    let marker = if config_path.exists() { "" } else { " (not found, using defaults)" };
    println!("config: {}{}", config_path.display(), marker);
    Ok(())
}
