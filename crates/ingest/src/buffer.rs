// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Per-partition buffering
//!
//! Buffers live in an arena: a vector of slots plus an index from partition
//! key to slot. Slots are created on first use and stay for the whole run,
//! so iteration follows first-touch order.

use crate::error::{IngestError, Result};
use std::collections::HashMap;
use tablestore::{MAX_BATCH_SIZE, Operation};

/// Operations taken out of one partition's buffer, submitted as one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub partition_key: String,
    /// Flush ordinal within the partition, starting at 0
    pub sequence: u64,
    /// Produced by the end-of-stream drain rather than by reaching the batch size
    pub drained: bool,
    pub operations: Vec<Operation>,
}

impl Batch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    #[must_use]
    pub fn row_keys(&self) -> Vec<String> {
        self.operations
            .iter()
            .map(|op| op.row_key().to_string())
            .collect()
    }
}

#[derive(Debug)]
struct PartitionBuffer {
    partition_key: String,
    pending: Vec<Operation>,
    flushed: u64,
}

impl PartitionBuffer {
    fn take(&mut self, capacity: usize, drained: bool) -> Batch {
        let operations = std::mem::replace(&mut self.pending, Vec::with_capacity(capacity));
        let sequence = self.flushed;
        self.flushed += 1;
        Batch {
            partition_key: self.partition_key.clone(),
            sequence,
            drained,
            operations,
        }
    }
}

/// Pending operations for every partition seen so far
#[derive(Debug)]
pub struct PartitionBuffers {
    batch_size: usize,
    index: HashMap<String, usize>,
    slots: Vec<PartitionBuffer>,
}

impl PartitionBuffers {
    pub fn new(batch_size: usize) -> Result<Self> {
        Self::with_capacity(batch_size, 0)
    }

    /// Like [`PartitionBuffers::new`], reserving room for `partitions` slots
    pub fn with_capacity(batch_size: usize, partitions: usize) -> Result<Self> {
        if !(1..=MAX_BATCH_SIZE).contains(&batch_size) {
            return Err(IngestError::invalid_config(format!(
                "batch size {batch_size} is outside 1..={MAX_BATCH_SIZE}"
            )));
        }
        Ok(Self {
            batch_size,
            index: HashMap::with_capacity(partitions),
            slots: Vec::with_capacity(partitions),
        })
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of partitions that have received at least one operation
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.slots.len()
    }

    /// Operations buffered and not yet handed out
    #[must_use]
    pub fn pending(&self) -> usize {
        self.slots.iter().map(|slot| slot.pending.len()).sum()
    }

    fn slot(&mut self, partition_key: &str) -> usize {
        if let Some(&slot) = self.index.get(partition_key) {
            return slot;
        }
        let slot = self.slots.len();
        self.slots.push(PartitionBuffer {
            partition_key: partition_key.to_string(),
            pending: Vec::with_capacity(self.batch_size),
            flushed: 0,
        });
        _ = self.index.insert(partition_key.to_string(), slot);
        slot
    }

    /// Buffer `operation` under `partition_key`.
    ///
    /// When this append fills the buffer to the batch size, the whole buffer
    /// is returned as a batch and the slot starts over empty, so the next
    /// append to the same partition always lands in a fresh batch.
    pub fn append(&mut self, partition_key: &str, operation: Operation) -> Result<Option<Batch>> {
        if operation.partition_key() != partition_key {
            return Err(IngestError::InvalidBatch {
                partition_key: partition_key.to_string(),
                reason: format!(
                    "row {} is keyed for partition {}",
                    operation.row_key(),
                    operation.partition_key()
                ),
            });
        }

        let batch_size = self.batch_size;
        let slot = self.slot(partition_key);
        let buffer = &mut self.slots[slot];
        buffer.pending.push(operation);

        if buffer.pending.len() >= batch_size {
            Ok(Some(buffer.take(batch_size, false)))
        } else {
            Ok(None)
        }
    }

    /// Hand out every non-empty buffer, in first-touch order
    pub fn drain_all(&mut self) -> Vec<Batch> {
        let batch_size = self.batch_size;
        self.slots
            .iter_mut()
            .filter(|slot| !slot.pending.is_empty())
            .map(|slot| slot.take(batch_size, true))
            .collect()
    }
}
