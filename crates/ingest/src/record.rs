// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Synthetic records
//!
//! Every record remembers where its generation started (`startIndex`) and
//! its own position (`currentIndex`), followed by random payload properties.

use crate::error::{IngestError, Result};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tablestore::{Entity, Value};

pub const START_INDEX: &str = "startIndex";
pub const CURRENT_INDEX: &str = "currentIndex";

/// A generated record, before it has partition and row keys
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    properties: BTreeMap<String, Value>,
}

impl Record {
    #[must_use]
    pub fn new(start_index: i64, current_index: i64) -> Self {
        let mut properties = BTreeMap::new();
        _ = properties.insert(START_INDEX.to_string(), Value::Int64(start_index));
        _ = properties.insert(CURRENT_INDEX.to_string(), Value::Int64(current_index));
        Self { properties }
    }

    #[must_use]
    pub fn with_property<K: Into<String>, V: Into<Value>>(mut self, name: K, value: V) -> Self {
        _ = self.properties.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn start_index(&self) -> Option<i64> {
        self.properties.get(START_INDEX).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn current_index(&self) -> Option<i64> {
        self.properties.get(CURRENT_INDEX).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Attach keys, producing the entity that will be stored
    #[must_use]
    pub fn into_entity(self, partition_key: String, row_key: String) -> Entity {
        Entity {
            partition_key,
            row_key,
            properties: self.properties,
        }
    }
}

/// Shape of the random payload attached to each record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSpec {
    /// Length of the `payload` text property
    pub width: usize,
    pub seed: u64,
}

impl Default for PayloadSpec {
    fn default() -> Self {
        Self {
            width: 32,
            seed: 0x7ab1e,
        }
    }
}

/// Iterator over `count` records starting at `start_index`
pub struct RecordGenerator {
    start: i64,
    next: i64,
    end: i64,
    width: usize,
    rng: StdRng,
}

impl Iterator for RecordGenerator {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        if self.next >= self.end {
            return None;
        }
        let current = self.next;
        self.next += 1;

        let payload: String = (&mut self.rng)
            .sample_iter(&Alphanumeric)
            .take(self.width)
            .map(char::from)
            .collect();

        Some(
            Record::new(self.start, current)
                .with_property("payload", payload)
                .with_property("amount", self.rng.gen_range(0..1_000_000_i64))
                .with_property("ratio", self.rng.r#gen::<f64>())
                .with_property("active", self.rng.gen_bool(0.5)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.end - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RecordGenerator {}

/// Generate `count` records. The same arguments always produce the same records.
///
/// Every index must fit the signed 64-bit index columns; a range that does
/// not is rejected rather than shortened.
pub fn generate_records(start_index: u64, count: u64, payload: &PayloadSpec) -> Result<RecordGenerator> {
    let end = start_index
        .checked_add(count)
        .and_then(|end| i64::try_from(end).ok());
    let (Ok(start), Some(end)) = (i64::try_from(start_index), end) else {
        return Err(IngestError::invalid_config(format!(
            "{count} records from index {start_index} exceed the index range"
        )));
    };
    Ok(RecordGenerator {
        start,
        next: start,
        end,
        width: payload.width,
        rng: StdRng::seed_from_u64(payload.seed),
    })
}
