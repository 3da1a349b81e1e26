// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for ingestion integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use ingest::{BatchSubmitter, IngestOptions, IngestSummary, IngestionDriver, PayloadSpec};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tablestore::{Entity, Error, MemoryTableStore, Operation, Result, TableStore};

pub const TABLE: &str = "bench";

/// One call to `submit_transaction`, as the backend saw it
#[derive(Debug, Clone)]
pub struct Submission {
    pub partition_key: String,
    pub row_keys: Vec<u64>,
    /// Logical clock readings when the call began and returned
    pub started: usize,
    pub finished: usize,
    pub succeeded: bool,
}

/// In-memory store that records every transaction and can inject faults
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryTableStore,
    delay: Duration,
    fail_on: Option<usize>,
    fail_partition: Option<String>,
    conflict_on: Option<usize>,
    panic_on_row: Option<u64>,
    calls: AtomicUsize,
    clock: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    log: Mutex<Vec<Submission>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every transaction for `delay` before applying it
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Reject the `n`-th transaction (0-based)
    pub fn failing_on(mut self, n: usize) -> Self {
        self.fail_on = Some(n);
        self
    }

    /// Reject every transaction for `partition_key`
    pub fn failing_partition(mut self, partition_key: &str) -> Self {
        self.fail_partition = Some(partition_key.to_string());
        self
    }

    /// Report the `n`-th transaction as already existing
    pub fn conflicting_on(mut self, n: usize) -> Self {
        self.conflict_on = Some(n);
        self
    }

    /// Panic inside any transaction that carries row `row`
    pub fn panicking_on_row(mut self, row: u64) -> Self {
        self.panic_on_row = Some(row);
        self
    }

    pub fn inner(&self) -> &MemoryTableStore {
        &self.inner
    }

    /// Calls to `submit_transaction`, including ones that never returned
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.log.lock().expect("log lock").clone()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TableStore for RecordingStore {
    async fn create_table(&self, name: &str) -> Result<()> {
        self.inner.create_table(name).await
    }

    async fn delete_table(&self, name: &str) -> Result<()> {
        self.inner.delete_table(name).await
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        self.inner.list_tables().await
    }

    async fn upsert(&self, table: &str, entity: Entity) -> Result<()> {
        self.inner.upsert(table, entity).await
    }

    async fn submit_transaction(
        &self,
        table: &str,
        partition_key: &str,
        operations: &[Operation],
    ) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let started = self.clock.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        _ = self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(row) = self.panic_on_row {
            let row = row.to_string();
            if operations.iter().any(|op| op.row_key() == row) {
                panic!("injected panic at row {row}");
            }
        }

        let result = if self.fail_on == Some(call)
            || self.fail_partition.as_deref() == Some(partition_key)
        {
            Err(Error::rejected(table, partition_key, "injected failure"))
        } else if self.conflict_on == Some(call) {
            Err(Error::AlreadyExists(format!("{table}/{partition_key}")))
        } else {
            self.inner
                .submit_transaction(table, partition_key, operations)
                .await
        };

        _ = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let finished = self.clock.fetch_add(1, Ordering::SeqCst);
        self.log.lock().expect("log lock").push(Submission {
            partition_key: partition_key.to_string(),
            row_keys: operations
                .iter()
                .map(|op| op.row_key().parse().expect("numeric row key"))
                .collect(),
            started,
            finished,
            succeeded: result.is_ok(),
        });
        result
    }

    async fn query(&self, table: &str, partition_key: Option<&str>) -> Result<Vec<Entity>> {
        self.inner.query(table, partition_key).await
    }
}

/// Ingest `count` generated records into [`TABLE`], creating it if needed
pub async fn ingest(
    store: &Arc<RecordingStore>,
    count: u64,
    options: &IngestOptions,
) -> ingest::Result<IngestSummary> {
    _ = store.create_table_if_absent(TABLE).await?;
    let backend: Arc<dyn TableStore> = store.clone();
    let mut driver = IngestionDriver::new(BatchSubmitter::new(backend, TABLE), options)?;
    driver
        .run(ingest::generate_records(0, count, &PayloadSpec::default())?)
        .await
}

/// Submissions grouped by partition, each group in start order
pub fn by_partition(submissions: &[Submission]) -> std::collections::BTreeMap<String, Vec<Submission>> {
    let mut groups: std::collections::BTreeMap<String, Vec<Submission>> = Default::default();
    for submission in submissions {
        groups
            .entry(submission.partition_key.clone())
            .or_default()
            .push(submission.clone());
    }
    for group in groups.values_mut() {
        group.sort_by_key(|s| s.started);
    }
    groups
}
