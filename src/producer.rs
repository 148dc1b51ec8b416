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

// Producer loop
//
// Per tick: assemble one unit, ask the pacer for its delay, wait out whatever
// is left of that delay, stamp the unit and stage it on the handoff.
//
// Drift correction: a tick is measured from the scheduled emission time of
// the previous unit, not from when the loop woke up, so reading, coercion and
// handoff time are absorbed into the interval instead of stretching it. If
// the loop falls more than one interval behind it re-anchors on the clock
// rather than emitting a catch-up burst.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::error::PlaybackError;
use crate::handoff::HandoffSender;
use crate::pacer::{Pacer, PacingPolicy};
use crate::record::{EmissionUnit, Envelope, ReadingColumns, Record};
use crate::source::{CsvRecordSource, Records};

/// Why the producer loop stopped
#[derive(Debug)]
pub enum ProducerExit {
    /// End of data without looping
    Completed,
    /// Shutdown requested
    Cancelled,
    /// Unrecoverable read or handoff failure
    Failed(PlaybackError),
}

/// Counters shared with the session
#[derive(Debug, Default)]
pub struct ProducerStats {
    pub units_emitted: AtomicU64,
    pub records_emitted: AtomicU64,
    pub ticks_skipped: AtomicU64,
    pub passes: AtomicU64,
}

struct Assembled {
    unit: Option<EmissionUnit>,
    eof: bool,
}

pub struct Producer {
    source: CsvRecordSource,
    records: Records,
    pacer: Pacer,
    columns: ReadingColumns,
    repeat_loop: bool,
    sender: HandoffSender,
    cancel: CancelToken,
    stats: Arc<ProducerStats>,
    /// Scheduled emission time of the previous unit
    next_tick: Option<Instant>,
    /// Records read in the current pass
    pass_records: u64,
}

impl Producer {
    pub fn new(
        source: CsvRecordSource,
        pacer: Pacer,
        columns: ReadingColumns,
        repeat_loop: bool,
        sender: HandoffSender,
        cancel: CancelToken,
        stats: Arc<ProducerStats>,
    ) -> Result<Self, PlaybackError> {
        let records = source.records()?;
        stats.passes.fetch_add(1, Ordering::Relaxed);
        Ok(Self {
            source,
            records,
            pacer,
            columns,
            repeat_loop,
            sender,
            cancel,
            stats,
            next_tick: None,
            pass_records: 0,
        })
    }

    /// Run until end-of-data (without looping), shutdown, or a fatal error
    pub fn run(mut self) -> ProducerExit {
        info!(
            "Producer started on '{}' ({:?})",
            self.source.path().display(),
            self.pacer.policy()
        );

        let exit = loop {
            match self.tick() {
                Ok(None) => continue,
                Ok(Some(exit)) => break exit,
                Err(PlaybackError::Cancelled) => break ProducerExit::Cancelled,
                Err(e) => {
                    error!("Producer stopped: {}", e);
                    break ProducerExit::Failed(e);
                }
            }
        };

        if !self.sender.is_empty() {
            warn!(
                "Discarding {} staged envelopes on producer exit",
                self.sender.len()
            );
        }
        info!(
            units = self.stats.units_emitted.load(Ordering::Relaxed),
            records = self.stats.records_emitted.load(Ordering::Relaxed),
            "Producer finished: {:?}",
            exit
        );
        exit
    }

    fn tick(&mut self) -> Result<Option<ProducerExit>, PlaybackError> {
        if self.cancel.is_cancelled() {
            return Err(PlaybackError::Cancelled);
        }
        let tick_start = self.next_tick.unwrap_or_else(Instant::now);

        let Assembled { mut unit, eof } = self.assemble()?;

        let delay = match unit.as_ref().map(|u| self.pacer.next_delay(u)) {
            Some(Ok(delay)) => delay,
            Some(Err(e)) if e.is_transient() => {
                warn!(row = self.records.row(), "Skipping tick: {}", e);
                self.stats.ticks_skipped.fetch_add(1, Ordering::Relaxed);
                unit = None;
                self.pacer.idle_delay()
            }
            Some(Err(e)) => return Err(e),
            // Nothing left in this pass; the next pass starts on schedule
            None if eof => Duration::ZERO,
            None => self.pacer.idle_delay(),
        };

        let deadline = tick_start + delay;
        let wait = deadline.saturating_duration_since(Instant::now());
        if self.cancel.wait_timeout(wait) {
            return Err(PlaybackError::Cancelled);
        }
        self.next_tick = Some(reanchor(deadline, delay, Instant::now()));

        if let Some(unit) = unit {
            let records = unit.record_count() as u64;
            let columns = &self.columns;
            let envelope = Envelope::stamp(unit.map_records(|r| columns.select(r)));
            self.sender.push(envelope)?;
            self.stats.units_emitted.fetch_add(1, Ordering::Relaxed);
            self.stats.records_emitted.fetch_add(records, Ordering::Relaxed);
        }

        if !eof {
            return Ok(None);
        }
        self.sender.flush()?;
        self.end_of_pass()
    }

    /// Pull one record, or a burst of records, from the current pass
    fn assemble(&mut self) -> Result<Assembled, PlaybackError> {
        let size = self.pacer.unit_size();
        let burst = matches!(self.pacer.policy(), PacingPolicy::Burst { .. });
        let mut collected: Vec<Record> = Vec::with_capacity(size);
        let mut eof = false;

        while collected.len() < size {
            match self.records.next() {
                None => {
                    eof = true;
                    break;
                }
                Some(Ok(record)) => {
                    self.pass_records += 1;
                    collected.push(record);
                }
                Some(Err(e)) if e.is_transient() => {
                    warn!("Skipping row: {}", e);
                    if !burst {
                        self.stats.ticks_skipped.fetch_add(1, Ordering::Relaxed);
                        return Ok(Assembled { unit: None, eof });
                    }
                }
                Some(Err(e)) => return Err(e),
            }
        }

        let unit = if collected.is_empty() {
            None
        } else if burst {
            Some(EmissionUnit::Burst(collected))
        } else {
            collected.pop().map(EmissionUnit::Single)
        };
        Ok(Assembled { unit, eof })
    }

    fn end_of_pass(&mut self) -> Result<Option<ProducerExit>, PlaybackError> {
        if !self.repeat_loop {
            info!("End of recording reached");
            return Ok(Some(ProducerExit::Completed));
        }
        if self.pass_records == 0 {
            warn!(
                "Recording '{}' has no data rows, not looping",
                self.source.path().display()
            );
            return Ok(Some(ProducerExit::Completed));
        }

        debug!("End of recording reached, rewinding");
        self.records = self.source.records()?;
        self.pass_records = 0;
        self.stats.passes.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }
}

/// Next tick start: the scheduled deadline, unless we are more than one interval late
fn reanchor(deadline: Instant, interval: Duration, now: Instant) -> Instant {
    if now.saturating_duration_since(deadline) > interval {
        now
    } else {
        deadline
    }
}
