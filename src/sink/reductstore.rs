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

// ReductStore sink implementation

use super::backend::{IngestionSink, SinkError};
use crate::config::ReductStoreConfig;
use crate::record::Reading;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{error, info, warn};

/// Posts readings as JSON records into a ReductStore bucket, one entry per asset
pub struct ReductStoreSink {
    client: Client,
    base_url: String,
    bucket_name: String,
    max_retries: u32,
}

impl ReductStoreSink {
    pub fn new(config: ReductStoreConfig) -> anyhow::Result<Self> {
        let mut client_builder = reqwest::ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(Duration::from_secs(config.timeout_seconds));

        // Add API token if provided
        if let Some(token) = config.api_token.as_deref().filter(|t| !t.is_empty()) {
            let mut headers = reqwest::header::HeaderMap::new();
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&auth_value).context("Invalid API token")?,
            );
            client_builder = client_builder.default_headers(headers);
        }

        let client = client_builder
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            bucket_name: config.bucket_name,
            max_retries: config.max_retries,
        })
    }

    fn entry_url(&self, reading: &Reading) -> String {
        format!(
            "{}/api/v1/b/{}/{}?ts={}",
            self.base_url,
            self.bucket_name,
            asset_to_entry_name(&reading.asset),
            reading.timestamp_us()
        )
    }

    /// Create bucket if it doesn't exist
    async fn ensure_bucket(&self) -> anyhow::Result<()> {
        let url = format!("{}/api/v1/b/{}", self.base_url, self.bucket_name);

        match self.client.head(&url).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Bucket '{}' already exists", self.bucket_name);
                Ok(())
            }
            _ => {
                info!("Creating bucket '{}'", self.bucket_name);
                let response = self
                    .client
                    .post(&url)
                    .send()
                    .await
                    .context("Failed to create bucket")?;

                if response.status().is_success() || response.status() == StatusCode::CONFLICT {
                    info!("Bucket '{}' created successfully", self.bucket_name);
                    Ok(())
                } else {
                    let status = response.status();
                    let error_text = response.text().await.unwrap_or_default();
                    Err(anyhow!("Failed to create bucket: {} - {}", status, error_text))
                }
            }
        }
    }

    /// One POST; client errors are soft rejections, everything else is retryable
    async fn post_once(&self, reading: &Reading, body: &[u8]) -> Result<(), Attempt> {
        let response = self
            .client
            .post(self.entry_url(reading))
            .header("Content-Type", "application/json")
            .header("x-reduct-label-key", reading.key.to_string())
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| Attempt::Retry(anyhow!(e).context("Failed to send request")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let error_text = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(Attempt::Reject(format!("{}: {}", status, error_text)))
        } else {
            Err(Attempt::Retry(anyhow!(
                "ReductStore write failed with status {}: {}",
                status,
                error_text
            )))
        }
    }
}

enum Attempt {
    Reject(String),
    Retry(anyhow::Error),
}

#[async_trait]
impl IngestionSink for ReductStoreSink {
    async fn initialize(&self) -> Result<(), SinkError> {
        self.ensure_bucket().await?;
        Ok(())
    }

    async fn submit_reading(&self, reading: Reading) -> Result<(), SinkError> {
        let body = serde_json::to_vec(&reading).context("Failed to serialize reading")?;
        let entry = asset_to_entry_name(&reading.asset);

        let mut attempt = 0;
        let mut delay = Duration::from_millis(100);

        loop {
            match self.post_once(&reading, &body).await {
                Ok(()) => {
                    if attempt > 0 {
                        info!(
                            "Successfully uploaded to entry '{}' after {} retries",
                            entry, attempt
                        );
                    }
                    return Ok(());
                }
                Err(Attempt::Reject(reason)) => return Err(SinkError::Rejected(reason)),
                Err(Attempt::Retry(e)) if attempt < self.max_retries => {
                    warn!(
                        "Upload to entry '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                        entry,
                        attempt + 1,
                        self.max_retries,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2; // Exponential backoff
                    delay = delay.min(Duration::from_secs(30));
                    attempt += 1;
                }
                Err(Attempt::Retry(e)) => {
                    error!(
                        "Upload to entry '{}' failed after {} attempts: {}",
                        entry,
                        attempt + 1,
                        e
                    );
                    return Err(SinkError::Backend(e));
                }
            }
        }
    }

    async fn health_check(&self) -> Result<bool, SinkError> {
        let url = format!("{}/api/v1/info", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => Ok(true),
            Ok(response) => {
                warn!("Health check failed with status: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Health check error: {}", e);
                Ok(false)
            }
        }
    }

    fn sink_type(&self) -> &str {
        "reductstore"
    }
}

/// ReductStore entry names allow letters, digits, `-` and `_`
pub fn asset_to_entry_name(asset: &str) -> String {
    asset
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_to_entry_name() {
        assert_eq!(asset_to_entry_name("sinusoid"), "sinusoid");
        assert_eq!(asset_to_entry_name("plant/line 1.temp"), "plant_line_1_temp");
    }

    #[test]
    fn test_new_with_token() {
        let config = ReductStoreConfig {
            api_token: Some("secret".to_string()),
            ..ReductStoreConfig::default()
        };
        let sink = ReductStoreSink::new(config).unwrap();
        assert_eq!(sink.sink_type(), "reductstore");
    }

    #[test]
    fn test_invalid_token_rejected() {
        let config = ReductStoreConfig {
            api_token: Some("bad\ntoken".to_string()),
            ..ReductStoreConfig::default()
        };
        assert!(ReductStoreSink::new(config).is_err());
    }

    #[tokio::test]
    async fn test_health_check_unreachable_server() {
        let config = ReductStoreConfig {
            url: "http://127.0.0.1:9".to_string(),
            max_retries: 0,
            timeout_seconds: 2,
            ..ReductStoreConfig::default()
        };
        let sink = ReductStoreSink::new(config).unwrap();
        assert!(!sink.health_check().await.unwrap());
    }
}
