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

// Data model shared by the producer, the consumer and the sinks

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Typed scalar parsed from one CSV cell
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Coerce a raw cell: integer first, then float, otherwise the verbatim string.
    ///
    /// Only digits, `-` and `.` may appear in a numeric cell, so values such as
    /// `"1e5"`, `"+3"`, `"inf"` or `" 12"` stay text.
    pub fn coerce(raw: &str) -> Self {
        let numeric_chars = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_digit() || c == '-' || c == '.');
        if numeric_chars {
            if let Ok(value) = raw.parse::<i64>() {
                return FieldValue::Integer(value);
            }
            if let Ok(value) = raw.parse::<f64>() {
                return FieldValue::Float(value);
            }
        }
        FieldValue::Text(raw.to_string())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Integer(v) => serializer.serialize_i64(*v),
            FieldValue::Float(v) => serializer.serialize_f64(*v),
            FieldValue::Text(v) => serializer.serialize_str(v),
        }
    }
}

/// One row of the recording, fields kept in file column order
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
    /// Cell text as read, parallel to `fields`; empty once columns are remapped
    raw: Vec<String>,
}

impl Record {
    /// Build a record from raw cells, coercing every value
    pub fn from_row<'a, I>(columns: &[String], cells: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let (fields, raw) = columns
            .iter()
            .zip(cells)
            .map(|(name, cell)| ((name.clone(), FieldValue::coerce(cell)), cell.to_string()))
            .unzip();
        Self { fields, raw }
    }

    /// Uncoerced cell text, e.g. `"095958"` where the value is `Integer(95958)`
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .position(|(field, _)| field == name)
            .and_then(|index| self.raw.get(index))
            .map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
            raw: Vec::new(),
        }
    }
}

// Equality is over the coerced fields only
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Column selection and renaming applied to every record before dispatch.
///
/// An empty mapping passes all columns through unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingColumns {
    mapping: HashMap<String, String>,
}

impl ReadingColumns {
    pub fn new(mapping: HashMap<String, String>) -> Self {
        Self { mapping }
    }

    pub fn is_passthrough(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Keep only mapped columns, renamed, in file column order
    pub fn select(&self, record: Record) -> Record {
        if self.is_passthrough() {
            return record;
        }
        record
            .fields
            .into_iter()
            .filter_map(|(name, value)| {
                self.mapping
                    .get(&name)
                    .map(|renamed| (renamed.clone(), value))
            })
            .collect()
    }
}

/// What one scheduling tick emits
#[derive(Debug, Clone, PartialEq)]
pub enum EmissionUnit {
    /// Batch and timestamp-replay policies
    Single(Record),
    /// Burst policy; shorter than the burst size only at end-of-data
    Burst(Vec<Record>),
}

impl EmissionUnit {
    pub fn record_count(&self) -> usize {
        match self {
            EmissionUnit::Single(_) => 1,
            EmissionUnit::Burst(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    pub fn map_records<F>(self, mut f: F) -> Self
    where
        F: FnMut(Record) -> Record,
    {
        match self {
            EmissionUnit::Single(record) => EmissionUnit::Single(f(record)),
            EmissionUnit::Burst(records) => {
                EmissionUnit::Burst(records.into_iter().map(f).collect())
            }
        }
    }
}

// Bursts are wrapped as {"data": [...]} so the sink sees one reading per burst
impl Serialize for EmissionUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EmissionUnit::Single(record) => record.serialize(serializer),
            EmissionUnit::Burst(records) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("data", records)?;
                map.end()
            }
        }
    }
}

/// A unit in transit between producer and consumer
#[derive(Debug, Clone)]
pub struct Envelope {
    pub payload: EmissionUnit,
    pub emitted_at: DateTime<Utc>,
}

impl Envelope {
    pub fn stamp(payload: EmissionUnit) -> Self {
        Self {
            payload,
            emitted_at: Utc::now(),
        }
    }
}

/// Sink-facing reading built by the consumer for each envelope
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub asset: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub key: Uuid,
    pub readings: EmissionUnit,
}

impl Reading {
    pub fn new(asset: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            asset: asset.into(),
            timestamp: envelope.emitted_at,
            key: Uuid::new_v4(),
            readings: envelope.payload,
        }
    }

    /// Wall-clock timestamp in the `YYYY-MM-DD HH:MM:SS.ffffff+00:00` form sinks expect
    pub fn timestamp_string(&self) -> String {
        format_timestamp(&self.timestamp)
    }

    pub fn timestamp_us(&self) -> u64 {
        self.timestamp.timestamp_micros().max(0) as u64
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.6f%:z").to_string()
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(ts))
}
