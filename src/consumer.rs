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

// Consumer side of the handoff
//
// The consumer thread drains batches in FIFO order and hands every envelope
// to the dispatcher, which spawns one task per reading on the async runtime
// and returns immediately. Completion order across readings is therefore not
// guaranteed; submission order is.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::IngestFailure;
use crate::handoff::HandoffReceiver;
use crate::record::{Envelope, Reading};
use crate::sink::{IngestionSink, SinkError};

/// Typed result of one dispatch
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The sink accepted the reading
    Delivered,
    /// Cancellation or sink shutdown; nothing to report
    Ignored,
    /// Soft failure reported by the sink
    Warning(String),
    /// Unexpected failure, surfaced on the failure channel
    Failed(IngestFailure),
}

/// Sort a sink result into one of the dispatch outcomes
pub fn classify(asset: &str, key: Uuid, result: Result<(), SinkError>) -> DispatchOutcome {
    match result {
        Ok(()) => DispatchOutcome::Delivered,
        Err(SinkError::Cancelled) | Err(SinkError::ShuttingDown) => DispatchOutcome::Ignored,
        Err(SinkError::Rejected(reason)) => DispatchOutcome::Warning(reason),
        Err(source @ SinkError::Backend(_)) => DispatchOutcome::Failed(IngestFailure {
            asset: asset.to_string(),
            key,
            source,
        }),
    }
}

/// Dispatch bookkeeping shared between the consumer thread, the dispatch
/// tasks and the session
#[derive(Debug, Default)]
pub struct DispatchTracker {
    consumer_done: AtomicBool,
    in_flight: AtomicUsize,
    dispatched: AtomicU64,
    delivered: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    notify: Notify,
}

impl DispatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// The consumer has exited and every dispatched reading completed
    pub fn is_idle(&self) -> bool {
        self.consumer_done.load(Ordering::SeqCst) && self.in_flight() == 0
    }

    /// Resolve once `is_idle` holds
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a completion in between is not lost
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn consumer_finished(&self) {
        self.consumer_done.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn begin(self: &Arc<Self>) -> InFlight {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight(Arc::clone(self))
    }

    fn record(&self, outcome: &DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Delivered => &self.delivered,
            DispatchOutcome::Warning(_) => &self.rejected,
            DispatchOutcome::Failed(_) => &self.failed,
            DispatchOutcome::Ignored => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Released when the dispatch task finishes or is dropped unrun
struct InFlight(Arc<DispatchTracker>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }
}

/// Turns envelopes into readings and submits them on the async runtime
pub struct Dispatcher {
    asset: String,
    sink: Arc<dyn IngestionSink>,
    runtime: Handle,
    failures: mpsc::UnboundedSender<IngestFailure>,
    tracker: Arc<DispatchTracker>,
}

impl Dispatcher {
    pub fn new(
        asset: impl Into<String>,
        sink: Arc<dyn IngestionSink>,
        runtime: Handle,
        failures: mpsc::UnboundedSender<IngestFailure>,
        tracker: Arc<DispatchTracker>,
    ) -> Self {
        Self {
            asset: asset.into(),
            sink,
            runtime,
            failures,
            tracker,
        }
    }

    pub fn tracker(&self) -> &Arc<DispatchTracker> {
        &self.tracker
    }

    /// Fire-and-forget: spawns the submission and returns without waiting
    pub fn dispatch(&self, envelope: Envelope) {
        let reading = Reading::new(self.asset.clone(), envelope);
        let key = reading.key;
        let asset = self.asset.clone();
        let sink = Arc::clone(&self.sink);
        let failures = self.failures.clone();
        let guard = self.tracker.begin();

        self.runtime.spawn(async move {
            let outcome = classify(&asset, key, sink.submit_reading(reading).await);
            guard.0.record(&outcome);

            match outcome {
                DispatchOutcome::Delivered => {}
                DispatchOutcome::Ignored => {
                    debug!(%key, "Dispatch dropped during shutdown");
                }
                DispatchOutcome::Warning(reason) => {
                    warn!(asset = %asset, %key, "Reading rejected by {}: {}", sink.sink_type(), reason);
                }
                DispatchOutcome::Failed(failure) => {
                    error!(asset = %asset, %key, "{}", failure);
                    if failures.send(failure).is_err() {
                        debug!(%key, "No failure listener attached");
                    }
                }
            }
            drop(guard);
        });
    }
}

/// Consumer drain loop
pub struct Consumer {
    receiver: HandoffReceiver,
    dispatcher: Dispatcher,
}

impl Consumer {
    pub fn new(receiver: HandoffReceiver, dispatcher: Dispatcher) -> Self {
        Self {
            receiver,
            dispatcher,
        }
    }

    /// Drain until the producer is gone or shutdown is requested
    pub fn run(self) {
        let mut batches: u64 = 0;
        while let Some(batch) = self.receiver.recv_batch() {
            batches += 1;
            debug!(batch = batches, size = batch.len(), "Draining handoff batch");
            for envelope in batch {
                self.dispatcher.dispatch(envelope);
            }
        }

        info!(
            batches,
            dispatched = self.dispatcher.tracker.dispatched(),
            "Consumer finished"
        );
        self.dispatcher.tracker.consumer_finished();
    }
}
