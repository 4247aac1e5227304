//! Process start-up shared by both binaries.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use drivekeep_common::AppConfig;

/// Install the global logger. Logs go to stderr so stdout carries only
/// the human-readable results.
pub fn init_logging(level: Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Apply an optional JSON config file on top of the binary's defaults.
pub fn load_config(path: Option<&Path>, defaults: AppConfig) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load(path, defaults)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => defaults,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
