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

// Playback session lifecycle
//
// A session owns one producer thread, one consumer thread and the handoff
// between them. Dispatch tasks run on the tokio runtime handed in by the
// host. Dropping the session shuts it down.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::cancel::CancelToken;
use crate::config::{restart_keys, PlayerSettings};
use crate::consumer::{Consumer, DispatchTracker, Dispatcher};
use crate::error::{IngestFailure, PlaybackError};
use crate::handoff::handoff;
use crate::pacer::Pacer;
use crate::producer::{Producer, ProducerExit, ProducerStats};
use crate::record::ReadingColumns;
use crate::sink::IngestionSink;
use crate::source::{ColumnNames, CsvRecordSource};

/// Snapshot of session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Emission units handed to the consumer side
    pub units_emitted: u64,
    /// Records contained in those units
    pub records_emitted: u64,
    pub ticks_skipped: u64,
    /// Passes started over the recording (more than one when looping)
    pub passes: u64,
    pub dispatched: u64,
    pub delivered: u64,
    /// Soft failures reported by the sink
    pub rejected: u64,
    pub failed: u64,
}

/// Result of applying new player settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconfigured {
    /// Nothing that shapes the replay changed
    Applied,
    /// The session was torn down and started again because of these fields
    Restarted(Vec<&'static str>),
}

pub struct PlaybackSession {
    settings: PlayerSettings,
    cancel: CancelToken,
    producer: Option<JoinHandle<ProducerExit>>,
    consumer: Option<JoinHandle<()>>,
    producer_stats: Arc<ProducerStats>,
    tracker: Arc<DispatchTracker>,
    failures: Option<mpsc::UnboundedReceiver<IngestFailure>>,
    exit: Option<ProducerExit>,
}

impl PlaybackSession {
    /// Open the recording and start the producer and consumer threads.
    ///
    /// Fails if the recording cannot be opened; nothing is left running then.
    pub fn start(
        settings: &PlayerSettings,
        sink: Arc<dyn IngestionSink>,
        runtime: Handle,
    ) -> Result<Self, PlaybackError> {
        let columns = if settings.header_row {
            ColumnNames::HeaderRow
        } else {
            ColumnNames::Explicit(settings.field_names.clone())
        };
        let source = CsvRecordSource::open(settings.csv_path(), columns)?;
        let pacer = Pacer::from_settings(settings);
        let capacity = settings.handoff_capacity();

        info!(
            asset = %settings.asset_name,
            capacity,
            sink = sink.sink_type(),
            "Starting playback of '{}' ({:?})",
            source.path().display(),
            pacer.policy()
        );

        let cancel = CancelToken::new();
        let (sender, receiver) = handoff(capacity, cancel.clone());

        let producer_stats = Arc::new(ProducerStats::default());
        let producer = Producer::new(
            source,
            pacer,
            ReadingColumns::new(settings.reading_cols.clone()),
            settings.repeat_loop,
            sender,
            cancel.clone(),
            Arc::clone(&producer_stats),
        )?;

        let (failure_tx, failure_rx) = mpsc::unbounded_channel();
        let tracker = Arc::new(DispatchTracker::new());
        let dispatcher = Dispatcher::new(
            settings.asset_name.clone(),
            sink,
            runtime,
            failure_tx,
            Arc::clone(&tracker),
        );
        let consumer = Consumer::new(receiver, dispatcher);

        let consumer = spawn_worker("playback-consumer", move || consumer.run())?;
        let producer = match spawn_worker("playback-producer", move || producer.run()) {
            Ok(handle) => handle,
            Err(e) => {
                cancel.cancel();
                if consumer.join().is_err() {
                    error!("Consumer thread panicked");
                }
                return Err(e);
            }
        };

        Ok(Self {
            settings: settings.clone(),
            cancel,
            producer: Some(producer),
            consumer: Some(consumer),
            producer_stats,
            tracker,
            failures: Some(failure_rx),
            exit: None,
        })
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    /// Resolves once the producer has stopped, the consumer drained every
    /// batch and no dispatch is still in flight
    pub async fn finished(&self) {
        self.tracker.wait_idle().await;
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.tracker.is_idle()
    }

    pub fn stats(&self) -> SessionStats {
        let producer = &self.producer_stats;
        SessionStats {
            units_emitted: producer.units_emitted.load(Ordering::Relaxed),
            records_emitted: producer.records_emitted.load(Ordering::Relaxed),
            ticks_skipped: producer.ticks_skipped.load(Ordering::Relaxed),
            passes: producer.passes.load(Ordering::Relaxed),
            dispatched: self.tracker.dispatched(),
            delivered: self.tracker.delivered(),
            rejected: self.tracker.rejected(),
            failed: self.tracker.failed(),
        }
    }

    /// Receiver for unexpected ingestion failures. Only the first call gets it.
    pub fn take_failures(&mut self) -> Option<mpsc::UnboundedReceiver<IngestFailure>> {
        self.failures.take()
    }

    /// How the producer ended, once the session has been shut down
    pub fn producer_exit(&self) -> Option<&ProducerExit> {
        self.exit.as_ref()
    }

    /// Cancel both loops and wait for their threads. Safe to call repeatedly.
    ///
    /// Dispatches already spawned keep running on the runtime.
    pub fn shutdown(&mut self) {
        if self.producer.is_none() && self.consumer.is_none() {
            return;
        }
        info!(asset = %self.settings.asset_name, "Shutting down playback");
        self.cancel.cancel();

        if let Some(handle) = self.producer.take() {
            match handle.join() {
                Ok(exit) => self.exit = Some(exit),
                Err(_) => error!("Producer thread panicked"),
            }
        }
        if let Some(handle) = self.consumer.take() {
            if handle.join().is_err() {
                error!("Consumer thread panicked");
            }
        }

        let in_flight = self.tracker.in_flight();
        if in_flight > 0 {
            warn!("{} dispatches still in flight after shutdown", in_flight);
        }
    }

    /// Apply new player settings, restarting the session if anything that
    /// shapes the replay changed
    pub fn reconfigure(
        &mut self,
        settings: &PlayerSettings,
        sink: Arc<dyn IngestionSink>,
        runtime: Handle,
    ) -> Result<Reconfigured, PlaybackError> {
        let keys = restart_keys(&self.settings, settings);
        if keys.is_empty() {
            return Ok(Reconfigured::Applied);
        }

        info!(?keys, "Player settings changed, restarting playback");
        self.shutdown();
        *self = Self::start(settings, sink, runtime)?;
        Ok(Reconfigured::Restarted(keys))
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_worker<F, T>(name: &'static str, f: F) -> Result<JoinHandle<T>, PlaybackError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|source| PlaybackError::Spawn { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestMode;
    use crate::sink::MemorySink;
    use std::io::Write;

    fn recording(rows: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ts,value").unwrap();
        for i in 0..rows {
            writeln!(file, "2024-01-01 00:00:{:02}.000000,{}", i, i).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn settings(path: &std::path::Path) -> PlayerSettings {
        PlayerSettings {
            csv_filename: path.to_string_lossy().into_owned(),
            ingest_mode: IngestMode::Batch,
            sample_rate: 1000,
            ..PlayerSettings::default()
        }
    }

    #[tokio::test]
    async fn test_start_fails_for_missing_recording() {
        let settings = PlayerSettings {
            csv_filename: "/nonexistent/recording.csv".to_string(),
            ..PlayerSettings::default()
        };
        let result = PlaybackSession::start(
            &settings,
            Arc::new(MemorySink::new()),
            Handle::current(),
        );
        assert!(matches!(result, Err(PlaybackError::SourceOpen { .. })));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let file = recording(3);
        let mut session = PlaybackSession::start(
            &settings(file.path()),
            Arc::new(MemorySink::new()),
            Handle::current(),
        )
        .unwrap();

        session.shutdown();
        session.shutdown();
        assert!(!session.is_running());
        assert!(session.producer_exit().is_some());
    }

    #[tokio::test]
    async fn test_reconfigure_without_changes_applies() {
        let file = recording(3);
        let settings = settings(file.path());
        let sink = Arc::new(MemorySink::new());
        let mut session =
            PlaybackSession::start(&settings, sink.clone(), Handle::current()).unwrap();

        let outcome = session
            .reconfigure(&settings.clone(), sink, Handle::current())
            .unwrap();
        assert_eq!(outcome, Reconfigured::Applied);
    }

    #[tokio::test]
    async fn test_take_failures_once() {
        let file = recording(1);
        let mut session = PlaybackSession::start(
            &settings(file.path()),
            Arc::new(MemorySink::new()),
            Handle::current(),
        )
        .unwrap();

        assert!(session.take_failures().is_some());
        assert!(session.take_failures().is_none());
    }
}
