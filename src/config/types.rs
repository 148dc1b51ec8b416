// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Configuration types for csv-playback

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub player: PlayerSettings,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Temporal policy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// One record per tick at `sample_rate`
    #[serde(alias = "realtime")]
    Batch,
    /// `burst_size` records every `burst_interval` ms
    Burst,
}

/// Everything that shapes the replayed data and its pacing.
///
/// Any change here requires the session to restart.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlayerSettings {
    #[serde(default = "default_asset_name", alias = "assetName")]
    pub asset_name: String,

    /// Root that relative `csv_filename` values resolve against
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_csv_filename", alias = "csvFilename")]
    pub csv_filename: String,

    #[serde(default = "default_true", alias = "headerRow")]
    pub header_row: bool,

    /// Column names when `header_row` is false
    #[serde(
        default,
        alias = "fieldNames",
        deserialize_with = "deserialize_field_names"
    )]
    pub field_names: Vec<String>,

    /// Source column -> output field; empty passes every column through
    #[serde(default, alias = "readingCols")]
    pub reading_cols: HashMap<String, String>,

    #[serde(default, alias = "timestampFromFile")]
    pub timestamp_from_file: bool,

    #[serde(default = "default_timestamp_col", alias = "timestampCol")]
    pub timestamp_col: Option<String>,

    /// strftime-style pattern (Python `%f` accepted) or "auto"
    #[serde(default = "default_timestamp_format", alias = "timestampFormat")]
    pub timestamp_format: String,

    #[serde(default = "default_ingest_mode", alias = "ingestMode")]
    pub ingest_mode: IngestMode,

    /// Records per second in batch mode; also sizes the handoff
    #[serde(default = "default_sample_rate", alias = "sampleRate")]
    pub sample_rate: u32,

    /// Milliseconds between bursts
    #[serde(default = "default_burst_interval", alias = "burstInterval")]
    pub burst_interval: u64,

    #[serde(default = "default_burst_size", alias = "burstSize")]
    pub burst_size: usize,

    #[serde(default, alias = "repeatLoop")]
    pub repeat_loop: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            asset_name: default_asset_name(),
            data_dir: default_data_dir(),
            csv_filename: default_csv_filename(),
            header_row: true,
            field_names: Vec::new(),
            reading_cols: HashMap::new(),
            timestamp_from_file: false,
            timestamp_col: default_timestamp_col(),
            timestamp_format: default_timestamp_format(),
            ingest_mode: default_ingest_mode(),
            sample_rate: default_sample_rate(),
            burst_interval: default_burst_interval(),
            burst_size: default_burst_size(),
            repeat_loop: false,
        }
    }
}

impl PlayerSettings {
    /// Recording location; absolute filenames bypass `data_dir`
    pub fn csv_path(&self) -> PathBuf {
        let file = Path::new(&self.csv_filename);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.data_dir.join(file)
        }
    }

    /// Timestamp column when replay pacing is enabled and applicable.
    ///
    /// Burst mode always paces by interval.
    pub fn replay_column(&self) -> Option<&str> {
        if !self.timestamp_from_file || self.ingest_mode == IngestMode::Burst {
            return None;
        }
        self.timestamp_col
            .as_deref()
            .filter(|col| !col.is_empty() && *col != "None")
    }

    /// Envelopes buffered before the consumer is woken: one second of data.
    ///
    /// One envelope when replaying timestamps; in burst mode each envelope is
    /// a whole burst, so one second is `1000 / burst_interval` of them.
    pub fn handoff_capacity(&self) -> usize {
        if self.ingest_mode == IngestMode::Burst {
            (1000 / self.burst_interval.max(1)).max(1) as usize
        } else if self.replay_column().is_some() {
            1
        } else {
            self.sample_rate.max(1) as usize
        }
    }

    pub fn burst_period(&self) -> Duration {
        Duration::from_millis(self.burst_interval)
    }
}

/// Sink selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// "log", "filesystem" or "reductstore"
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default)]
    pub filesystem: Option<FilesystemConfig>,

    #[serde(default)]
    pub reductstore: Option<ReductStoreConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            filesystem: None,
            reductstore: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReductStoreConfig {
    pub url: String,
    pub bucket_name: String,
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

impl Default for ReductStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8383".to_string(),
            bucket_name: "playback".to_string(),
            api_token: None,
            timeout_seconds: default_timeout(),
            max_retries: default_retries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesystemConfig {
    pub base_path: String,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            base_path: "/data/readings".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String, // "text", "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Accepts either a YAML list or a comma-separated string
fn deserialize_field_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Names {
        List(Vec<String>),
        Joined(String),
        Missing(()),
    }

    Ok(match Names::deserialize(deserializer)? {
        Names::List(names) => names.into_iter().map(|n| n.trim().to_string()).collect(),
        Names::Joined(joined) if joined.trim().is_empty() || joined == "None" => Vec::new(),
        Names::Joined(joined) => joined.split(',').map(|n| n.trim().to_string()).collect(),
        Names::Missing(()) => Vec::new(),
    })
}

// Default value functions
fn default_true() -> bool { true }
fn default_asset_name() -> String { "sample".to_string() }
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_csv_filename() -> String { "sinusoid.csv".to_string() }
fn default_timestamp_col() -> Option<String> { Some("ts".to_string()) }
fn default_timestamp_format() -> String { "%Y-%m-%d %H:%M:%S.%f".to_string() }
fn default_ingest_mode() -> IngestMode { IngestMode::Burst }
fn default_sample_rate() -> u32 { 100 }
fn default_burst_interval() -> u64 { 1000 }
fn default_burst_size() -> usize { 1 }
fn default_backend() -> String { "log".to_string() }
fn default_timeout() -> u64 { 300 }
fn default_retries() -> u32 { 3 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
