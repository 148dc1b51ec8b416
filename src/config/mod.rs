// Configuration module for csv-playback
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Aggregated configuration validation
// - Default values
// - Restart detection on reconfiguration

pub mod types;
mod loader;

pub use types::*;
pub use loader::{ConfigError, ConfigLoader};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PlaybackConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<PlaybackConfig> {
    let mut config = load_config(path)?;

    // Allow environment variables to override config values
    if let Ok(asset_name) = std::env::var("PLAYBACK_ASSET_NAME") {
        config.player.asset_name = asset_name;
    }

    if let Ok(data_dir) = std::env::var("PLAYBACK_DATA_DIR") {
        config.player.data_dir = PathBuf::from(data_dir);
    }

    if let Ok(reduct_url) = std::env::var("REDUCTSTORE_URL") {
        if let Some(reduct_config) = config.storage.reductstore.as_mut() {
            reduct_config.url = reduct_url;
        }
    }

    if let Ok(api_token) = std::env::var("REDUCT_API_TOKEN") {
        if let Some(reduct_config) = config.storage.reductstore.as_mut() {
            reduct_config.api_token = Some(api_token);
        }
    }

    ConfigLoader::validate(&config)?;
    Ok(config)
}

/// Command-line overrides applied on top of a loaded configuration
#[derive(Debug, Clone, Default)]
pub struct PlayerOverrides {
    pub asset_name: Option<String>,
    pub csv_filename: Option<String>,
    pub repeat_loop: bool,
}

impl PlayerOverrides {
    /// Apply the overrides, then validate the merged configuration again
    pub fn apply(self, config: &mut PlaybackConfig) -> std::result::Result<(), ConfigError> {
        if let Some(asset_name) = self.asset_name {
            config.player.asset_name = asset_name;
        }
        if let Some(csv_filename) = self.csv_filename {
            config.player.csv_filename = csv_filename;
        }
        if self.repeat_loop {
            config.player.repeat_loop = true;
        }
        ConfigLoader::validate(config)
    }
}

/// Player settings that differ between two configurations.
///
/// Each of them changes data identity or pacing, so a non-empty result means
/// the running session has to be torn down and started again.
pub fn restart_keys(old: &PlayerSettings, new: &PlayerSettings) -> Vec<&'static str> {
    let mut changed = Vec::new();
    let mut check = |key: &'static str, differs: bool| {
        if differs {
            changed.push(key);
        }
    };

    check("asset_name", old.asset_name != new.asset_name);
    check("data_dir", old.data_dir != new.data_dir);
    check("csv_filename", old.csv_filename != new.csv_filename);
    check("header_row", old.header_row != new.header_row);
    check("field_names", old.field_names != new.field_names);
    check("reading_cols", old.reading_cols != new.reading_cols);
    check("timestamp_from_file", old.timestamp_from_file != new.timestamp_from_file);
    check("timestamp_col", old.timestamp_col != new.timestamp_col);
    check("timestamp_format", old.timestamp_format != new.timestamp_format);
    check("ingest_mode", old.ingest_mode != new.ingest_mode);
    check("sample_rate", old.sample_rate != new.sample_rate);
    check("burst_interval", old.burst_interval != new.burst_interval);
    check("burst_size", old.burst_size != new.burst_size);
    check("repeat_loop", old.repeat_loop != new.repeat_loop);

    changed
}
