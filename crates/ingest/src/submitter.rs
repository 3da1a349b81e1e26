// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::buffer::Batch;
use crate::error::{IngestError, Result};
use diagnostics::*;
use std::sync::Arc;
use tablestore::{MAX_BATCH_SIZE, TableStore};

/// What happened to a submitted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Every operation of the batch was applied
    Applied { rows: usize },
    /// The backend reported that the destination already exists
    Conflict,
}

/// Submits one partition's batch as a single transaction against a table.
///
/// Never retries on its own; wrap the store in a
/// [`tablestore::RetryingStore`] to retry transient failures.
#[derive(Clone)]
pub struct BatchSubmitter {
    store: Arc<dyn TableStore>,
    table: String,
}

impl BatchSubmitter {
    pub fn new<S: Into<String>>(store: Arc<dyn TableStore>, table: S) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn validate(batch: &Batch) -> Result<()> {
        let reason = if batch.is_empty() {
            Some("batch is empty".to_string())
        } else if batch.len() > MAX_BATCH_SIZE {
            Some(format!(
                "{} operations exceeds the transaction limit of {MAX_BATCH_SIZE}",
                batch.len()
            ))
        } else {
            batch
                .operations
                .iter()
                .find(|op| op.partition_key() != batch.partition_key)
                .map(|op| {
                    format!(
                        "row {} is keyed for partition {}",
                        op.row_key(),
                        op.partition_key()
                    )
                })
        };

        match reason {
            Some(reason) => Err(IngestError::InvalidBatch {
                partition_key: batch.partition_key.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Submit `batch`. Ownership of its operations passes to the backend.
    pub async fn submit(&self, batch: Batch) -> Result<SubmitOutcome> {
        Self::validate(&batch)?;

        let partition_key = batch.partition_key.as_str();
        let sequence = batch.sequence;
        let rows = batch.len();

        match self
            .store
            .submit_transaction(&self.table, partition_key, &batch.operations)
            .await
        {
            Ok(()) => {
                debug!(
                    "Flushed {rows} rows to {table}/{partition_key} (batch {sequence})",
                    rows: rows,
                    table: self.table.as_str(),
                    partition_key: partition_key,
                    sequence: sequence
                );
                Ok(SubmitOutcome::Applied { rows })
            }
            Err(err) if err.is_conflict() => {
                warn!(
                    "Ignoring conflict for {table}/{partition_key} (batch {sequence}): {error}",
                    table: self.table.as_str(),
                    partition_key: partition_key,
                    sequence: sequence,
                    error: err.to_string()
                );
                Ok(SubmitOutcome::Conflict)
            }
            Err(err) => {
                error!(
                    "Batch {sequence} for {table}/{partition_key} failed: {error}",
                    sequence: sequence,
                    table: self.table.as_str(),
                    partition_key: partition_key,
                    error: err.to_string()
                );
                Err(IngestError::TransactionRejected {
                    partition_key: batch.partition_key.clone(),
                    sequence,
                    row_keys: batch.row_keys(),
                    source: err,
                })
            }
        }
    }
}
