// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{IngestError, Result};
use crate::record::Record;
use tablestore::Entity;

/// Prefix of generated partition keys
pub const DEFAULT_PARTITION_PREFIX: &str = "batch_";

/// Where a record at a given sequence index is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub partition: u64,
    pub partition_key: String,
    pub row_key: String,
}

/// Maps sequence indices to partitions by `index mod modulo`.
///
/// Pure: the same `(index, modulo)` always produces the same keys, so a run
/// can be repeated and its rows overwritten in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRouter {
    modulo: u64,
    prefix: String,
}

impl PartitionRouter {
    pub fn new(modulo: u64) -> Result<Self> {
        if modulo == 0 {
            return Err(IngestError::invalid_config("partition modulo must be at least 1"));
        }
        Ok(Self {
            modulo,
            prefix: DEFAULT_PARTITION_PREFIX.to_string(),
        })
    }

    #[must_use]
    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn modulo(&self) -> u64 {
        self.modulo
    }

    #[must_use]
    pub fn partition_key(&self, partition: u64) -> String {
        format!("{}{partition}", self.prefix)
    }

    #[must_use]
    pub fn assign(&self, index: u64) -> Assignment {
        let partition = index % self.modulo;
        Assignment {
            partition,
            partition_key: self.partition_key(partition),
            row_key: index.to_string(),
        }
    }

    /// Key `record` as the `index`-th record of the run
    #[must_use]
    pub fn route(&self, index: u64, record: Record) -> Entity {
        let Assignment {
            partition_key,
            row_key,
            ..
        } = self.assign(index);
        record.into_entity(partition_key, row_key)
    }
}
