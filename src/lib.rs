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

// CSV playback: replays a recorded CSV file as a paced, live feed
//
// - Reads the recording lazily, one coerced record at a time
// - Paces emission at a fixed rate, in fixed-size bursts, or by the gaps
//   between the recording's own timestamps
// - Hands units from a producer thread to a consumer thread in batches
// - Dispatches each unit to an ingestion sink without waiting for it
// - Optionally loops the recording until shut down

pub mod cancel;
pub mod config;
pub mod consumer;
pub mod error;
pub mod handoff;
pub mod pacer;
pub mod producer;
pub mod record;
pub mod session;
pub mod sink;
pub mod source;

// Re-export main types
pub use cancel::CancelToken;
pub use config::{load_config, load_config_with_env, PlaybackConfig, PlayerSettings};
pub use consumer::{classify, DispatchOutcome};
pub use error::{IngestFailure, PlaybackError};
pub use pacer::{Pacer, PacingPolicy, TimestampParser};
pub use record::{EmissionUnit, Envelope, FieldValue, Reading, ReadingColumns, Record};
pub use session::{PlaybackSession, Reconfigured, SessionStats};
pub use sink::{IngestionSink, SinkError, SinkFactory};
pub use source::{ColumnNames, CsvRecordSource};
