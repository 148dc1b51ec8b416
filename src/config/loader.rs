// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

const MAX_SAMPLE_RATE: u32 = 1_000_000;

/// Every problem found in a configuration, reported together
#[derive(Debug, Error)]
#[error("invalid configuration: {}", .0.join("; "))]
pub struct ConfigError(pub Vec<String>);

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PlaybackConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;

        Self::from_yaml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_yaml(content: &str) -> Result<PlaybackConfig> {
        let content = Self::substitute_env_vars(content);

        let config: PlaybackConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${PLAYBACK_DATA:-data} -> data (if PLAYBACK_DATA not set)
    fn substitute_env_vars(content: &str) -> String {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env var pattern is valid")
        });

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    // Keep original if no default and var not found
                    None => format!("${{{}}}", var_name),
                },
            }
        })
        .to_string()
    }

    /// Validate configuration, collecting every problem
    pub fn validate(config: &PlaybackConfig) -> std::result::Result<(), ConfigError> {
        let mut problems = Vec::new();
        let player = &config.player;

        if player.asset_name.trim().is_empty() {
            problems.push("player.asset_name cannot be empty".to_string());
        }
        if player.csv_filename.trim().is_empty() {
            problems.push("player.csv_filename cannot be empty".to_string());
        }
        if !player.header_row && player.field_names.is_empty() {
            problems.push("player.field_names is required when header_row is false".to_string());
        }
        if player.sample_rate < 1 || player.sample_rate > MAX_SAMPLE_RATE {
            problems.push(format!(
                "player.sample_rate should be in range 1-{}, got {}",
                MAX_SAMPLE_RATE, player.sample_rate
            ));
        }
        if player.burst_size < 1 {
            problems.push("player.burst_size should not be less than 1".to_string());
        }
        if player.burst_interval < 1 {
            problems.push("player.burst_interval should not be less than 1".to_string());
        }
        if player.timestamp_from_file {
            let has_column = player
                .timestamp_col
                .as_deref()
                .is_some_and(|col| !col.is_empty() && col != "None");
            if !has_column {
                problems.push(
                    "player.timestamp_col is required when timestamp_from_file is true".to_string(),
                );
            }
            if player.timestamp_format.trim().is_empty() {
                problems.push("player.timestamp_format cannot be empty".to_string());
            }
        }

        match config.storage.backend.as_str() {
            "log" => {}
            "filesystem" => {
                if config.storage.filesystem.is_none() {
                    problems.push(
                        "filesystem backend selected but filesystem config missing".to_string(),
                    );
                }
            }
            "reductstore" => {
                if config.storage.reductstore.is_none() {
                    problems.push(
                        "reductstore backend selected but reductstore config missing".to_string(),
                    );
                }
            }
            unknown => problems.push(format!(
                "Unknown backend: '{}'. Supported: log, filesystem, reductstore",
                unknown
            )),
        }

        if !matches!(
            config.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            problems.push(format!("logging.level '{}' is not recognised", config.logging.level));
        }
        if !matches!(config.logging.format.as_str(), "text" | "json") {
            problems.push(format!(
                "logging.format must be text or json, got '{}'",
                config.logging.format
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError(problems))
        }
    }
}
