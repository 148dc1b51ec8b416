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

// Error types for the playback pipeline

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::sink::SinkError;

/// Errors raised while reading, pacing or handing off recorded data
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The recording could not be opened. Fatal at session start.
    #[error("failed to open recording '{}': {source}", path.display())]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Header row missing while `header_row` is enabled
    #[error("recording '{}' has no header row", path.display())]
    MissingHeader { path: PathBuf },

    /// I/O failure while reading a row
    #[error("failed to read row {row} of '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        row: u64,
        #[source]
        source: std::io::Error,
    },

    /// Row could not be split into the expected columns
    #[error("malformed row {row}: {message}")]
    MalformedRow { row: u64, message: String },

    /// Timestamp column absent from the record
    #[error("timestamp column '{column}' missing from record")]
    MissingTimestamp { column: String },

    /// Timestamp value did not match the configured format
    #[error("cannot parse timestamp '{value}' in column '{column}': {reason}")]
    Timestamp {
        column: String,
        value: String,
        reason: String,
    },

    /// Consumer side of the handoff is gone
    #[error("handoff queue closed")]
    HandoffClosed,

    /// Shutdown was requested while waiting on the handoff
    #[error("playback cancelled")]
    Cancelled,

    /// Worker thread could not be spawned
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl PlaybackError {
    /// Errors local to one tick: logged, the tick is skipped, the loop continues
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::MalformedRow { .. }
                | PlaybackError::MissingTimestamp { .. }
                | PlaybackError::Timestamp { .. }
        )
    }
}

/// Unexpected ingestion failure surfaced to whoever supervises dispatch
#[derive(Debug, Error)]
#[error("ingestion of reading {key} for asset '{asset}' failed: {source}")]
pub struct IngestFailure {
    pub asset: String,
    pub key: Uuid,
    #[source]
    pub source: SinkError,
}
