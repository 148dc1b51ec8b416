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

// Sink factory for creating ingestion sinks from configuration

use super::backend::IngestionSink;
use super::filesystem::FilesystemSink;
use super::log::LogSink;
use super::reductstore::ReductStoreSink;
use crate::config::StorageConfig;
use anyhow::{anyhow, bail, Result};
use std::sync::Arc;

pub struct SinkFactory;

impl SinkFactory {
    /// Create ingestion sink from configuration
    pub fn create(config: &StorageConfig) -> Result<Arc<dyn IngestionSink>> {
        match config.backend.as_str() {
            "log" => Ok(Arc::new(LogSink::new())),

            "filesystem" => {
                let fs_config = config
                    .filesystem
                    .as_ref()
                    .ok_or_else(|| anyhow!("Filesystem config missing"))?;
                Ok(Arc::new(FilesystemSink::new(fs_config.clone())))
            }

            "reductstore" => {
                let reduct_config = config
                    .reductstore
                    .as_ref()
                    .ok_or_else(|| anyhow!("ReductStore config missing"))?;
                Ok(Arc::new(ReductStoreSink::new(reduct_config.clone())?))
            }

            unknown => bail!(
                "Unknown storage backend: '{}'. Supported: log, filesystem, reductstore",
                unknown
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilesystemConfig, ReductStoreConfig};

    #[test]
    fn test_create_log_sink() {
        let sink = SinkFactory::create(&StorageConfig::default()).unwrap();
        assert_eq!(sink.sink_type(), "log");
    }

    #[test]
    fn test_create_filesystem_sink() {
        let config = StorageConfig {
            backend: "filesystem".to_string(),
            filesystem: Some(FilesystemConfig::default()),
            reductstore: None,
        };
        assert_eq!(SinkFactory::create(&config).unwrap().sink_type(), "filesystem");
    }

    #[test]
    fn test_create_reductstore_sink() {
        let config = StorageConfig {
            backend: "reductstore".to_string(),
            filesystem: None,
            reductstore: Some(ReductStoreConfig::default()),
        };
        assert_eq!(SinkFactory::create(&config).unwrap().sink_type(), "reductstore");
    }

    #[test]
    fn test_missing_section() {
        let config = StorageConfig {
            backend: "filesystem".to_string(),
            filesystem: None,
            reductstore: None,
        };
        let err = SinkFactory::create(&config).err().unwrap();
        assert!(err.to_string().contains("Filesystem config missing"));
    }

    #[test]
    fn test_create_unknown_sink() {
        let config = StorageConfig {
            backend: "s3".to_string(),
            ..StorageConfig::default()
        };
        let err = SinkFactory::create(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown storage backend"));
    }
}
