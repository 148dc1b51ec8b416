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

// Filesystem sink implementation

use super::backend::{IngestionSink, SinkError};
use super::reductstore::asset_to_entry_name;
use crate::config::FilesystemConfig;
use crate::record::Reading;
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Writes every reading as one JSON document on local disk
pub struct FilesystemSink {
    base_path: PathBuf,
}

impl FilesystemSink {
    pub fn new(config: FilesystemConfig) -> Self {
        let base_path = PathBuf::from(&config.base_path);

        info!("Initializing filesystem sink at: {}", base_path.display());

        Self { base_path }
    }

    /// Per-asset directory; the asset name is reduced to `[A-Za-z0-9_-]`
    fn asset_dir(&self, asset: &str) -> PathBuf {
        self.base_path.join(asset_to_entry_name(asset))
    }

    /// `<base>/<asset>/<timestamp_us>-<key>.json`
    fn reading_path(&self, reading: &Reading) -> PathBuf {
        self.asset_dir(&reading.asset)
            .join(format!("{}-{}.json", reading.timestamp_us(), reading.key))
    }

    async fn ensure_directory(&self, dir: &Path) -> anyhow::Result<()> {
        if !fs::try_exists(dir).await.unwrap_or(false) {
            debug!("Creating directory: {}", dir.display());
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl IngestionSink for FilesystemSink {
    async fn initialize(&self) -> Result<(), SinkError> {
        self.ensure_directory(&self.base_path).await?;
        Ok(())
    }

    async fn submit_reading(&self, reading: Reading) -> Result<(), SinkError> {
        let asset_dir = self.asset_dir(&reading.asset);
        self.ensure_directory(&asset_dir).await?;

        let path = self.reading_path(&reading);
        let body = serde_json::to_vec_pretty(&reading).context("Failed to serialize reading")?;

        let mut file = fs::File::create(&path)
            .await
            .with_context(|| format!("Failed to create file: {}", path.display()))?;
        file.write_all(&body).await.context("Failed to write reading")?;
        file.flush().await.context("Failed to flush reading")?;

        debug!(
            "Wrote reading {} ({} bytes) to {}",
            reading.key,
            body.len(),
            path.display()
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SinkError> {
        // Check if base directory is accessible and writable
        match fs::metadata(&self.base_path).await {
            Ok(metadata) if metadata.is_dir() => {
                let probe = self.base_path.join(".health_check_test");
                match fs::write(&probe, b"test").await {
                    Ok(()) => {
                        let _ = fs::remove_file(&probe).await;
                        Ok(true)
                    }
                    Err(e) => {
                        warn!("Health check failed - cannot write: {}", e);
                        Ok(false)
                    }
                }
            }
            Ok(_) => {
                warn!(
                    "Health check failed - base path is not a directory: {}",
                    self.base_path.display()
                );
                Ok(false)
            }
            Err(e) => {
                warn!(
                    "Health check failed - cannot access base path {}: {}",
                    self.base_path.display(),
                    e
                );
                Ok(false)
            }
        }
    }

    fn sink_type(&self) -> &str {
        "filesystem"
    }
}
