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

// Bounded single-producer/single-consumer handoff between the producer and
// consumer threads.
//
// Send policy: envelopes are staged on the producer side and handed to the
// consumer as one batch only when staging reaches capacity or the producer
// reports end-of-data (`flush`). The consumer therefore wakes once per batch,
// not once per envelope. Batches travel over a zero-capacity crossbeam
// channel, so the producer blocks until the consumer takes the batch and at
// most `capacity` envelopes are ever buffered.

use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender};
use std::time::Duration;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::PlaybackError;
use crate::record::Envelope;

/// How often a blocked flush rechecks for shutdown
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Create a handoff with room for `capacity` envelopes (at least one)
pub fn handoff(capacity: usize, cancel: CancelToken) -> (HandoffSender, HandoffReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = channel::bounded(0);
    (
        HandoffSender {
            staged: Vec::with_capacity(capacity),
            capacity,
            tx,
            cancel: cancel.clone(),
        },
        HandoffReceiver { rx, cancel },
    )
}

pub struct HandoffSender {
    staged: Vec<Envelope>,
    capacity: usize,
    tx: Sender<Vec<Envelope>>,
    cancel: CancelToken,
}

impl HandoffSender {
    /// Stage one envelope; hands the batch over once staging is full
    pub fn push(&mut self, envelope: Envelope) -> Result<(), PlaybackError> {
        self.staged.push(envelope);
        if self.staged.len() >= self.capacity {
            self.flush()?;
        }
        Ok(())
    }

    /// Hand over whatever is staged (end-of-data). No-op when empty.
    pub fn flush(&mut self) -> Result<(), PlaybackError> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let mut batch = std::mem::replace(&mut self.staged, Vec::with_capacity(self.capacity));
        debug!("Handing off batch of {} envelopes", batch.len());

        loop {
            match self.tx.send_timeout(batch, CANCEL_POLL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(unsent)) => {
                    if self.cancel.is_cancelled() {
                        self.staged = unsent;
                        return Err(PlaybackError::Cancelled);
                    }
                    batch = unsent;
                }
                Err(SendTimeoutError::Disconnected(unsent)) => {
                    self.staged = unsent;
                    return Err(PlaybackError::HandoffClosed);
                }
            }
        }
    }

    /// Envelopes staged but not yet handed over
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

pub struct HandoffReceiver {
    rx: Receiver<Vec<Envelope>>,
    cancel: CancelToken,
}

impl HandoffReceiver {
    /// Block until the next batch arrives.
    ///
    /// Returns `None` once the producer is gone or shutdown was requested.
    pub fn recv_batch(&self) -> Option<Vec<Envelope>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        crossbeam::select! {
            recv(self.rx) -> batch => batch.ok(),
            recv(self.cancel.signal()) -> _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EmissionUnit, Record};
    use std::thread;

    fn envelope() -> Envelope {
        Envelope::stamp(EmissionUnit::Single(Record::default()))
    }

    #[test]
    fn test_push_below_capacity_stays_staged() {
        let (mut tx, _rx) = handoff(3, CancelToken::new());
        tx.push(envelope()).unwrap();
        tx.push(envelope()).unwrap();
        assert_eq!(tx.len(), 2);
        assert_eq!(tx.capacity(), 3);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (tx, _rx) = handoff(0, CancelToken::new());
        assert_eq!(tx.capacity(), 1);
    }

    #[test]
    fn test_flush_after_receiver_dropped() {
        let (mut tx, rx) = handoff(2, CancelToken::new());
        drop(rx);
        tx.push(envelope()).unwrap();
        assert!(matches!(tx.flush(), Err(PlaybackError::HandoffClosed)));
        // Nothing is dropped on failure
        assert_eq!(tx.len(), 1);
    }

    #[test]
    fn test_blocked_flush_returns_on_cancel() {
        let cancel = CancelToken::new();
        let (mut tx, _rx) = handoff(1, cancel.clone());
        let handle = thread::spawn(move || tx.push(envelope()));

        thread::sleep(Duration::from_millis(30));
        cancel.cancel();
        assert!(matches!(
            handle.join().unwrap(),
            Err(PlaybackError::Cancelled)
        ));
    }
}
