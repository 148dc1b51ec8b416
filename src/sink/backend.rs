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

// Ingestion sink trait

use async_trait::async_trait;
use thiserror::Error;

use crate::record::Reading;

/// Failure reported by a sink for one reading
#[derive(Debug, Error)]
pub enum SinkError {
    /// The submission was cancelled
    #[error("submission cancelled")]
    Cancelled,

    /// The sink is shutting down and no longer accepts readings
    #[error("sink is shutting down")]
    ShuttingDown,

    /// Soft failure: the sink refused this reading but remains usable
    #[error("reading rejected: {0}")]
    Rejected(String),

    /// Anything else
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Destination for paced readings
///
/// Implementations own their durability and timeouts; the dispatcher applies
/// none of its own.
#[async_trait]
pub trait IngestionSink: Send + Sync {
    /// Prepare the sink (create bucket/directory if needed)
    async fn initialize(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Record one reading
    async fn submit_reading(&self, reading: Reading) -> Result<(), SinkError>;

    /// Health check
    async fn health_check(&self) -> Result<bool, SinkError> {
        Ok(true)
    }

    /// Get sink type identifier
    fn sink_type(&self) -> &str;
}
