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

use async_trait::async_trait;
use tracing::info;

use super::backend::{IngestionSink, SinkError};
use crate::record::Reading;

/// Logs a one-line summary per reading
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IngestionSink for LogSink {
    async fn submit_reading(&self, reading: Reading) -> Result<(), SinkError> {
        info!(
            asset = %reading.asset,
            key = %reading.key,
            timestamp = %reading.timestamp_string(),
            records = reading.readings.record_count(),
            "Reading ingested"
        );
        Ok(())
    }

    fn sink_type(&self) -> &str {
        "log"
    }
}
