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
use std::sync::Mutex;

use super::backend::{IngestionSink, SinkError};
use crate::record::Reading;

/// Keeps every reading in memory, in completion order
#[derive(Debug, Default)]
pub struct MemorySink {
    readings: Mutex<Vec<Reading>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn readings(&self) -> Vec<Reading> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Reading>> {
        self.readings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl IngestionSink for MemorySink {
    async fn submit_reading(&self, reading: Reading) -> Result<(), SinkError> {
        self.lock().push(reading);
        Ok(())
    }

    fn sink_type(&self) -> &str {
        "memory"
    }
}
