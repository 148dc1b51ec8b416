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

// Emission pacing
//
// Decides how long to wait before the next unit goes out. The producer owns
// the wait itself; all three policies share it.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{IngestMode, PlayerSettings};
use crate::error::PlaybackError;
use crate::record::{EmissionUnit, FieldValue, Record};

/// Free-form layouts tried by `TimestampParser::Auto`, most specific first
const AUTO_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
const AUTO_TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];
const AUTO_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

#[derive(Debug, Clone, PartialEq)]
pub enum PacingPolicy {
    /// One record every `period`
    FixedRate { period: Duration },
    /// `size` records every `interval`
    Burst { interval: Duration, size: usize },
    /// Reproduce the recording's own spacing from `column`
    TimestampReplay {
        column: String,
        parser: TimestampParser,
    },
}

pub struct Pacer {
    policy: PacingPolicy,
    previous: Option<NaiveDateTime>,
}

impl Pacer {
    pub fn new(policy: PacingPolicy) -> Self {
        Self {
            policy,
            previous: None,
        }
    }

    /// Burst mode wins over timestamp replay; replay wins over the fixed rate
    pub fn from_settings(settings: &PlayerSettings) -> Self {
        let policy = match (settings.ingest_mode, settings.replay_column()) {
            (IngestMode::Burst, _) => PacingPolicy::Burst {
                interval: settings.burst_period(),
                size: settings.burst_size.max(1),
            },
            (IngestMode::Batch, Some(column)) => PacingPolicy::TimestampReplay {
                column: column.to_string(),
                parser: TimestampParser::new(&settings.timestamp_format),
            },
            (IngestMode::Batch, None) => PacingPolicy::FixedRate {
                period: rate_period(settings.sample_rate),
            },
        };
        Self::new(policy)
    }

    pub fn policy(&self) -> &PacingPolicy {
        &self.policy
    }

    /// Records per emission unit
    pub fn unit_size(&self) -> usize {
        match self.policy {
            PacingPolicy::Burst { size, .. } => size,
            _ => 1,
        }
    }

    /// Nominal delay before `unit` is emitted
    pub fn next_delay(&mut self, unit: &EmissionUnit) -> Result<Duration, PlaybackError> {
        match &self.policy {
            PacingPolicy::FixedRate { period } => Ok(*period),
            PacingPolicy::Burst { interval, .. } => Ok(*interval),
            PacingPolicy::TimestampReplay { column, parser } => {
                let record = match unit {
                    EmissionUnit::Single(record) => record,
                    EmissionUnit::Burst(records) => match records.last() {
                        Some(record) => record,
                        None => return Ok(Duration::ZERO),
                    },
                };
                let current = record_timestamp(record, column, parser)?;
                let delay = match self.previous {
                    // First record anchors wall-clock start
                    None => Duration::ZERO,
                    Some(previous) => match (current - previous).to_std() {
                        Ok(delay) => delay,
                        Err(_) => {
                            debug!(
                                "Non-monotonic timestamp in column '{}': {} precedes {}",
                                column, current, previous
                            );
                            Duration::ZERO
                        }
                    },
                };
                self.previous = Some(current);
                Ok(delay)
            }
        }
    }

    /// Delay for a tick that produced nothing
    pub fn idle_delay(&self) -> Duration {
        match &self.policy {
            PacingPolicy::FixedRate { period } => *period,
            PacingPolicy::Burst { interval, .. } => *interval,
            PacingPolicy::TimestampReplay { .. } => Duration::ZERO,
        }
    }
}

/// Batch period, falling back to one second for a zero rate
fn rate_period(sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        warn!(
            anomaly = "zero_sample_rate",
            "sample_rate must be greater than 0, pacing at 1 record per second"
        );
        return Duration::from_secs(1);
    }
    Duration::from_nanos(1_000_000_000 / u64::from(sample_rate))
}

fn record_timestamp(
    record: &Record,
    column: &str,
    parser: &TimestampParser,
) -> Result<NaiveDateTime, PlaybackError> {
    let value = record
        .get(column)
        .ok_or_else(|| PlaybackError::MissingTimestamp {
            column: column.to_string(),
        })?;
    // Parse the cell as written; coercion drops leading zeros ("095958")
    let text = match record.raw(column) {
        Some(raw) => raw.to_string(),
        None => value.to_string(),
    };
    parser.parse(&text).map_err(|reason| PlaybackError::Timestamp {
        column: column.to_string(),
        value: text,
        reason,
    })
}

/// Parses the recording's timestamp column
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampParser {
    /// chrono pattern, already translated from Python-style `%f`
    Pattern(String),
    /// RFC 3339, common layouts, or numeric epoch seconds
    Auto,
}

impl TimestampParser {
    /// "auto" (or the legacy "None") selects free-form detection
    pub fn new(format: &str) -> Self {
        let format = format.trim();
        if format.eq_ignore_ascii_case("auto") || format == "None" {
            TimestampParser::Auto
        } else {
            TimestampParser::Pattern(translate_fraction(format))
        }
    }

    /// Parse the cell text of a timestamp column
    pub fn parse(&self, text: &str) -> Result<NaiveDateTime, String> {
        match self {
            TimestampParser::Pattern(pattern) => parse_with(text.trim(), pattern),
            TimestampParser::Auto => parse_auto(&FieldValue::coerce(text.trim())),
        }
    }
}

/// Python's `.%f` is chrono's `%.f`; a bare `%f` means exactly six digits
fn translate_fraction(format: &str) -> String {
    format.replace(".%f", "%.f").replace("%f", "%6f")
}

fn parse_with(text: &str, pattern: &str) -> Result<NaiveDateTime, String> {
    if let Ok(with_offset) = DateTime::parse_from_str(text, pattern) {
        return Ok(with_offset.naive_utc());
    }
    let err = match NaiveDateTime::parse_from_str(text, pattern) {
        Ok(parsed) => return Ok(parsed),
        Err(err) => err,
    };
    if let Ok(time) = NaiveTime::parse_from_str(text, pattern) {
        return Ok(anchor_date().and_time(time));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, pattern) {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    Err(format!("does not match '{}': {}", pattern, err))
}

fn parse_auto(value: &FieldValue) -> Result<NaiveDateTime, String> {
    let text = match value {
        FieldValue::Integer(secs) => {
            return DateTime::from_timestamp(*secs, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| "epoch seconds out of range".to_string())
        }
        FieldValue::Float(secs) => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round() as u32;
            return DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| "epoch seconds out of range".to_string());
        }
        FieldValue::Text(text) => text.trim(),
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.naive_utc());
    }
    for pattern in AUTO_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, pattern) {
            return Ok(parsed);
        }
    }
    for pattern in AUTO_TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(text, pattern) {
            return Ok(anchor_date().and_time(time));
        }
    }
    for pattern in AUTO_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, pattern) {
            return Ok(date.and_time(NaiveTime::MIN));
        }
    }
    Err("unrecognised timestamp layout".to_string())
}

// Time-only values share one arbitrary date; only differences matter
fn anchor_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}
