// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Ingest - partitioned batch ingestion and benchmarking
//!
//! Records are routed to partitions by sequence index, buffered per
//! partition and flushed as single-partition transactions once a buffer
//! reaches the batch size. Whatever is left when the stream ends is
//! drained as partial batches. The benchmark harness times whole runs and
//! persists the results.

mod benchmark;
mod buffer;
mod config;
mod driver;
mod error;
mod export;
mod record;
mod router;
mod submitter;

pub use benchmark::{
    BenchmarkHarness, BenchmarkParams, BenchmarkResult, DEFAULT_TABLE_PREFIX, FailedRun,
    Strategy, SuiteReport, throughput,
};
pub use buffer::{Batch, PartitionBuffers};
pub use config::SuiteConfig;
pub use driver::{
    DEFAULT_PROGRESS_INTERVAL, DriverState, IngestOptions, IngestSummary, IngestionDriver, Mode,
};
pub use error::{IngestError, Result};
pub use export::{
    RESULTS_TABLE, ResultExporter, ResultRow, render_table, result_entity, result_from_entity,
    result_row_key, run_timestamp,
};
pub use record::{CURRENT_INDEX, PayloadSpec, Record, RecordGenerator, START_INDEX, generate_records};
pub use router::{Assignment, DEFAULT_PARTITION_PREFIX, PartitionRouter};
pub use submitter::{BatchSubmitter, SubmitOutcome};
