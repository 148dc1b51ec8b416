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

// Ingestion sink module
//
// Trait-based abstraction over the destination of paced readings. The
// playback core only ever talks to `IngestionSink`; the concrete sinks here
// make the binary usable on its own.

pub mod backend;
pub mod factory;
pub mod filesystem;
pub mod log;
pub mod memory;
pub mod reductstore;

pub use backend::{IngestionSink, SinkError};
pub use factory::SinkFactory;
pub use filesystem::FilesystemSink;
pub use log::LogSink;
pub use memory::MemorySink;
pub use reductstore::{asset_to_entry_name, ReductStoreSink};
