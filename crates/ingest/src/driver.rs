// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Ingestion driver
//!
//! Streams records through the router into per-partition buffers and
//! submits each batch as soon as it fills, then drains whatever is left
//! once the stream ends.
//!
//! Two submission modes exist. [`Mode::Sequential`] awaits every flush
//! inline. [`Mode::Concurrent`] spawns flushes onto a [`JoinSet`] bounded
//! by a semaphore; flushes of one partition are chained through oneshot
//! completion signals so they never overlap, and the first failure cancels
//! everything that has not started yet. Every spawned flush is joined
//! before [`IngestionDriver::run`] returns.

use crate::buffer::{Batch, PartitionBuffers};
use crate::error::{IngestError, Result};
use crate::record::Record;
use crate::router::PartitionRouter;
use crate::submitter::{BatchSubmitter, SubmitOutcome};
use diagnostics::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tablestore::Operation;
use tokio::sync::{Semaphore, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Records between progress log lines
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 50;

// Upper bound on buffer slots reserved up front
const PRESIZED_PARTITIONS: u64 = 1024;

/// How full batches are submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One flush at a time, awaited where it is triggered
    Sequential,
    /// Up to `max_in_flight` flushes of distinct partitions at once
    Concurrent { max_in_flight: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Start,
    Streaming,
    Draining,
    Done,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverState::Start => "start",
            DriverState::Streaming => "streaming",
            DriverState::Draining => "draining",
            DriverState::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    pub batch_size: usize,
    /// Partition modulo
    pub partitions: u64,
    pub mode: Mode,
    /// Log progress every this many records; 0 disables progress logging
    pub progress_interval: u64,
}

impl IngestOptions {
    #[must_use]
    pub fn new(batch_size: usize, partitions: u64) -> Self {
        Self {
            batch_size,
            partitions,
            mode: Mode::Sequential,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_progress_interval(mut self, progress_interval: u64) -> Self {
        self.progress_interval = progress_interval;
        self
    }
}

/// Counters for a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Records routed into buffers
    pub records: u64,
    /// Batches accepted by the backend, including absorbed conflicts
    pub batches: u64,
    /// Of `batches`, how many came from the end-of-stream drain
    pub drain_batches: u64,
    pub rows_applied: u64,
    pub conflicts: u64,
}

#[derive(Debug, Default)]
struct FlushReport {
    submitted: u64,
    drain_batches: u64,
    rows: u64,
    conflicts: u64,
    skipped: u64,
    failures: Vec<IngestError>,
}

impl FlushReport {
    fn record(&mut self, outcome: SubmitOutcome, drained: bool) {
        self.submitted += 1;
        if drained {
            self.drain_batches += 1;
        }
        match outcome {
            SubmitOutcome::Applied { rows } => self.rows += rows as u64,
            SubmitOutcome::Conflict => self.conflicts += 1,
        }
    }

    fn into_summary(mut self, records: u64, halted: Option<IngestError>) -> Result<IngestSummary> {
        self.failures.extend(halted);
        if !self.failures.is_empty() {
            return Err(IngestError::Aborted {
                submitted: self.submitted,
                failures: self.failures,
            });
        }
        Ok(IngestSummary {
            records,
            batches: self.submitted,
            drain_batches: self.drain_batches,
            rows_applied: self.rows,
            conflicts: self.conflicts,
        })
    }
}

/// Awaits each flush where it is triggered
struct InlineFlusher {
    submitter: BatchSubmitter,
    report: FlushReport,
}

impl InlineFlusher {
    async fn flush(&mut self, batch: Batch) -> bool {
        let drained = batch.drained;
        match self.submitter.submit(batch).await {
            Ok(outcome) => {
                self.report.record(outcome, drained);
                true
            }
            Err(err) => {
                self.report.failures.push(err);
                false
            }
        }
    }
}

struct FlushDone {
    drained: bool,
    /// `None` when the flush was skipped after cancellation
    outcome: Result<Option<SubmitOutcome>>,
}

/// Runs flushes as tasks, at most `max_in_flight` at once
struct FlushPool {
    submitter: BatchSubmitter,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    tasks: JoinSet<FlushDone>,
    // Completion signal of the latest flush scheduled for each partition
    tails: HashMap<String, oneshot::Receiver<()>>,
    report: FlushReport,
}

impl FlushPool {
    fn new(submitter: BatchSubmitter, max_in_flight: usize) -> Self {
        Self {
            submitter,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
            tails: HashMap::new(),
            report: FlushReport::default(),
        }
    }

    /// Schedule `batch`, waiting for a free slot first.
    ///
    /// Returns `false` once the pool has been cancelled.
    async fn flush(&mut self, batch: Batch) -> bool {
        self.reap();
        if self.cancel.is_cancelled() {
            return false;
        }

        let permit = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return false,
            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };

        let (done_tx, done_rx) = oneshot::channel();
        let previous = self.tails.insert(batch.partition_key.clone(), done_rx);
        let submitter = self.submitter.clone();
        let cancel = self.cancel.clone();

        _ = self.tasks.spawn(async move {
            let _permit = permit;
            if let Some(previous) = previous {
                // The sender is dropped without a signal when the previous
                // flush panicked or was skipped
                if previous.await.is_err() {
                    cancel.cancel();
                }
            }

            let drained = batch.drained;
            if cancel.is_cancelled() {
                debug!(
                    "Skipping batch {sequence} of {partition_key} after cancellation",
                    sequence: batch.sequence,
                    partition_key: batch.partition_key.as_str()
                );
                return FlushDone {
                    drained,
                    outcome: Ok(None),
                };
            }

            let outcome = submitter.submit(batch).await;
            if outcome.is_err() {
                cancel.cancel();
            }
            _ = done_tx.send(());
            FlushDone {
                drained,
                outcome: outcome.map(Some),
            }
        });
        true
    }

    fn absorb(&mut self, joined: std::result::Result<FlushDone, JoinError>) {
        match joined {
            Ok(FlushDone {
                drained,
                outcome: Ok(Some(outcome)),
            }) => self.report.record(outcome, drained),
            Ok(FlushDone { outcome: Ok(None), .. }) => self.report.skipped += 1,
            Ok(FlushDone {
                outcome: Err(err), ..
            }) => self.report.failures.push(err),
            Err(err) => {
                self.cancel.cancel();
                self.report.failures.push(err.into());
            }
        }
    }

    /// Collect flushes that already finished, without waiting
    fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            self.absorb(joined);
        }
    }

    async fn finish(mut self) -> FlushReport {
        while let Some(joined) = self.tasks.join_next().await {
            self.absorb(joined);
        }
        if self.report.skipped > 0 {
            debug!("Skipped {skipped} flushes after cancellation", skipped: self.report.skipped);
        }
        self.report
    }
}

enum Flusher {
    Inline(InlineFlusher),
    Pool(FlushPool),
}

impl Flusher {
    async fn flush(&mut self, batch: Batch) -> bool {
        match self {
            Flusher::Inline(inline) => inline.flush(batch).await,
            Flusher::Pool(pool) => pool.flush(batch).await,
        }
    }

    async fn finish(self) -> FlushReport {
        match self {
            Flusher::Inline(inline) => inline.report,
            Flusher::Pool(pool) => pool.finish().await,
        }
    }
}

/// Drives one ingestion run from `Start` to `Done`
pub struct IngestionDriver {
    router: PartitionRouter,
    buffers: PartitionBuffers,
    submitter: BatchSubmitter,
    mode: Mode,
    progress_interval: u64,
    state: DriverState,
}

impl IngestionDriver {
    pub fn new(submitter: BatchSubmitter, options: &IngestOptions) -> Result<Self> {
        if let Mode::Concurrent { max_in_flight: 0 } = options.mode {
            return Err(IngestError::invalid_config("max_in_flight must be at least 1"));
        }
        let router = PartitionRouter::new(options.partitions)?;
        let presized = usize::try_from(options.partitions.min(PRESIZED_PARTITIONS)).unwrap_or(0);
        let buffers = PartitionBuffers::with_capacity(options.batch_size, presized)?;

        Ok(Self {
            router,
            buffers,
            submitter,
            mode: options.mode,
            progress_interval: options.progress_interval,
            state: DriverState::Start,
        })
    }

    #[must_use]
    pub fn state(&self) -> DriverState {
        self.state
    }

    fn transition(&mut self, next: DriverState) {
        debug!(
            "Driver {from} -> {to}",
            from: self.state.to_string(),
            to: next.to_string()
        );
        self.state = next;
    }

    /// Ingest `records` in order. A driver runs once.
    pub async fn run<I>(&mut self, records: I) -> Result<IngestSummary>
    where
        I: IntoIterator<Item = Record>,
    {
        if self.state != DriverState::Start {
            return Err(IngestError::invalid_config(format!(
                "driver cannot run from state {}",
                self.state
            )));
        }

        let flusher = match self.mode {
            Mode::Sequential => Flusher::Inline(InlineFlusher {
                submitter: self.submitter.clone(),
                report: FlushReport::default(),
            }),
            Mode::Concurrent { max_in_flight } => {
                Flusher::Pool(FlushPool::new(self.submitter.clone(), max_in_flight))
            }
        };

        info!(
            "Ingesting into {table} (batch size {batch_size}, {partitions} partitions, {mode})",
            table: self.submitter.table(),
            batch_size: self.buffers.batch_size(),
            partitions: self.router.modulo(),
            mode: format!("{:?}", self.mode)
        );

        self.stream(records, flusher).await
    }

    async fn stream<I>(&mut self, records: I, mut flusher: Flusher) -> Result<IngestSummary>
    where
        I: IntoIterator<Item = Record>,
    {
        self.transition(DriverState::Streaming);

        let mut routed: u64 = 0;
        let mut halted = None;
        let mut stopped = false;

        for record in records {
            let entity = self.router.route(routed, record);
            let partition_key = entity.partition_key.clone();
            routed += 1;

            match self.buffers.append(&partition_key, Operation::Upsert(entity)) {
                Ok(Some(batch)) => {
                    if !flusher.flush(batch).await {
                        stopped = true;
                        break;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    halted = Some(err);
                    break;
                }
            }

            if self.progress_interval > 0 && routed % self.progress_interval == 0 {
                info!("Routed {routed} records", routed: routed);
            }
        }

        if halted.is_none() && !stopped {
            self.transition(DriverState::Draining);
            let remainders = self.buffers.drain_all();
            debug!("Draining {count} partial batches", count: remainders.len());
            for batch in remainders {
                if !flusher.flush(batch).await {
                    break;
                }
            }
        }

        let report = flusher.finish().await;
        self.transition(DriverState::Done);

        let summary = report.into_summary(routed, halted);
        match &summary {
            Ok(summary) => info!(
                "Ingested {records} records in {batches} batches ({drain_batches} drained, {conflicts} conflicts)",
                records: summary.records,
                batches: summary.batches,
                drain_batches: summary.drain_batches,
                conflicts: summary.conflicts
            ),
            Err(err) => error!("Ingestion into {table} failed: {error}", table: self.submitter.table(), error: err.to_string()),
        }
        summary
    }
}
