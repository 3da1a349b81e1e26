// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Benchmark harness
//!
//! Times full ingestion runs and derives throughput. A suite runs every
//! combination of a [`SuiteConfig`] and keeps failed runs alongside the
//! results instead of stopping at the first one.

use crate::config::SuiteConfig;
use crate::driver::{DEFAULT_PROGRESS_INTERVAL, IngestOptions, IngestionDriver, Mode};
use crate::error::{IngestError, Result};
use crate::record::{PayloadSpec, Record, generate_records};
use crate::submitter::BatchSubmitter;
use diagnostics::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tablestore::TableStore;

/// Default prefix of per-run table names
pub const DEFAULT_TABLE_PREFIX: &str = "bench";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Sequential,
    Concurrent,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::Sequential, Strategy::Concurrent];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Sequential => "sequential",
            Strategy::Concurrent => "concurrent",
        }
    }

    #[must_use]
    pub fn mode(self, max_in_flight: usize) -> Mode {
        match self {
            Strategy::Sequential => Mode::Sequential,
            Strategy::Concurrent => Mode::Concurrent { max_in_flight },
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| IngestError::invalid_config(format!("unknown strategy '{s}'")))
    }
}

/// Parameters of one benchmark run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkParams {
    pub record_count: u64,
    pub batch_size: usize,
    pub partition_count: u64,
    pub strategy: Strategy,
    /// Only used by [`Strategy::Concurrent`]
    pub max_in_flight: usize,
    pub payload: PayloadSpec,
}

impl BenchmarkParams {
    #[must_use]
    pub fn new(record_count: u64, batch_size: usize, partition_count: u64, strategy: Strategy) -> Self {
        Self {
            record_count,
            batch_size,
            partition_count,
            strategy,
            max_in_flight: 8,
            payload: PayloadSpec::default(),
        }
    }

    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: PayloadSpec) -> Self {
        self.payload = payload;
        self
    }
}

impl fmt::Display for BenchmarkParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records, {} batch size {}, {} partitions",
            self.record_count, self.strategy, self.batch_size, self.partition_count
        )
    }
}

/// Outcome of one successful run
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub strategy: Strategy,
    pub batch_size: usize,
    pub partition_count: u64,
    pub record_count: u64,
    pub batches: u64,
    /// Rows written by applied transactions; conflicted batches add none
    pub rows_applied: u64,
    pub conflicts: u64,
    pub elapsed: Duration,
    /// Records per second; `None` when no measurable time elapsed
    pub throughput: Option<f64>,
}

impl BenchmarkResult {
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Records per second over `elapsed`, undefined for a zero duration
#[must_use]
pub fn throughput(records: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        Some(records as f64 / secs)
    } else {
        None
    }
}

/// A suite run that produced no result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRun {
    pub params: BenchmarkParams,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuiteReport {
    pub results: Vec<BenchmarkResult>,
    pub failures: Vec<FailedRun>,
}

/// Runs benchmarks against one store, each in its own table
pub struct BenchmarkHarness {
    store: Arc<dyn TableStore>,
    table_prefix: String,
    fresh_tables: bool,
    cleanup: bool,
    progress_interval: u64,
}

impl BenchmarkHarness {
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            fresh_tables: true,
            cleanup: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_table_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Delete a leftover table of the same name before each run
    #[must_use]
    pub fn with_fresh_tables(mut self, fresh_tables: bool) -> Self {
        self.fresh_tables = fresh_tables;
        self
    }

    /// Delete each run's table once it has been measured
    #[must_use]
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    #[must_use]
    pub fn with_progress_interval(mut self, progress_interval: u64) -> Self {
        self.progress_interval = progress_interval;
        self
    }

    /// Table that a run with `params` writes into, e.g. `benchsequential100x10`
    #[must_use]
    pub fn table_name(&self, params: &BenchmarkParams) -> String {
        format!(
            "{}{}{}x{}",
            self.table_prefix, params.strategy, params.batch_size, params.partition_count
        )
    }

    async fn prepare_table(&self, table: &str) -> Result<()> {
        if self.fresh_tables {
            match self.store.delete_table(table).await {
                Ok(()) => debug!("Deleted leftover table {table}", table: table),
                Err(tablestore::Error::TableNotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        if self.store.create_table_if_absent(table).await? {
            debug!("Created table {table}", table: table);
        }
        Ok(())
    }

    /// Run one benchmark.
    ///
    /// Record generation happens before the clock starts; table setup and
    /// cleanup are not timed either.
    pub async fn run(&self, params: &BenchmarkParams) -> Result<BenchmarkResult> {
        let table = self.table_name(params);
        let records: Vec<Record> =
            generate_records(0, params.record_count, &params.payload)?.collect();
        self.prepare_table(&table).await?;

        let options = IngestOptions::new(params.batch_size, params.partition_count)
            .with_mode(params.strategy.mode(params.max_in_flight))
            .with_progress_interval(self.progress_interval);
        let submitter = BatchSubmitter::new(Arc::clone(&self.store), table.clone());
        let mut driver = IngestionDriver::new(submitter, &options)?;

        info!("Starting run: {params}", params: params.to_string());
        let started = Instant::now();
        let outcome = driver.run(records).await;
        let elapsed = started.elapsed();

        let cleaned = if self.cleanup {
            self.store.delete_table(&table).await
        } else {
            Ok(())
        };
        let summary = outcome?;
        cleaned?;

        let result = BenchmarkResult {
            strategy: params.strategy,
            batch_size: params.batch_size,
            partition_count: params.partition_count,
            record_count: summary.records,
            batches: summary.batches,
            rows_applied: summary.rows_applied,
            conflicts: summary.conflicts,
            elapsed,
            throughput: throughput(summary.records, elapsed),
        };
        match result.throughput {
            Some(rate) => info!(
                "Finished {table} in {elapsed}s ({rate} records/s)",
                table: table.as_str(),
                elapsed: result.elapsed_secs(),
                rate: rate
            ),
            None => warn!(
                "Finished {table} too quickly to measure throughput",
                table: table.as_str()
            ),
        }
        Ok(result)
    }

    /// Run every combination in `config`. Individual run failures are
    /// collected in the report; only an invalid config fails the suite.
    pub async fn run_suite(&self, config: &SuiteConfig) -> Result<SuiteReport> {
        config.validate()?;
        let grid = config.combinations();
        let total = grid.len();
        let mut report = SuiteReport::default();

        for (position, params) in grid.into_iter().enumerate() {
            info!(
                "Suite run {position} of {total}",
                position: position + 1,
                total: total
            );
            match self.run(&params).await {
                Ok(result) => report.results.push(result),
                Err(err) => {
                    error!(
                        "Run failed ({params}): {error}",
                        params: params.to_string(),
                        error: err.to_string()
                    );
                    report.failures.push(FailedRun {
                        params,
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablestore::MemoryTableStore;

    #[test]
    fn test_throughput_is_exact() {
        assert_eq!(throughput(1000, Duration::from_secs(2)), Some(500.0));
        assert_eq!(throughput(1000, Duration::from_millis(2000)), Some(500.0));
    }

    #[test]
    fn test_zero_elapsed_is_undefined() {
        assert_eq!(throughput(1000, Duration::ZERO), None);
        assert_eq!(throughput(0, Duration::ZERO), None);
        assert_eq!(throughput(0, Duration::from_secs(1)), Some(0.0));
    }

    #[test]
    fn test_strategy_names() -> Result<()> {
        assert_eq!("sequential".parse::<Strategy>()?, Strategy::Sequential);
        assert_eq!(" Concurrent".parse::<Strategy>()?, Strategy::Concurrent);
        assert!("parallel".parse::<Strategy>().is_err());
        assert_eq!(Strategy::Concurrent.to_string(), "concurrent");
        assert_eq!(
            Strategy::Concurrent.mode(4),
            Mode::Concurrent { max_in_flight: 4 }
        );
        Ok(())
    }

    #[test]
    fn test_table_name() {
        let harness = BenchmarkHarness::new(Arc::new(MemoryTableStore::new()));
        let params = BenchmarkParams::new(10, 100, 10, Strategy::Sequential);
        assert_eq!(harness.table_name(&params), "benchsequential100x10");
        assert!(tablestore::validate_table_name(&harness.table_name(&params)).is_ok());
    }

    #[tokio::test]
    async fn test_run_produces_result() -> Result<()> {
        let store = MemoryTableStore::new();
        let harness = BenchmarkHarness::new(Arc::new(store.clone()));
        let params = BenchmarkParams::new(120, 25, 2, Strategy::Concurrent).with_max_in_flight(2);

        let result = harness.run(&params).await?;
        assert_eq!(result.record_count, 120);
        assert_eq!(result.batches, 6);
        assert_eq!(result.strategy, Strategy::Concurrent);
        assert_eq!(store.row_count(&harness.table_name(&params)).await?, 120);
        assert_eq!(result.rows_applied, 120);
        assert_eq!(result.conflicts, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unrepresentable_record_count() -> Result<()> {
        let store = MemoryTableStore::new();
        let harness = BenchmarkHarness::new(Arc::new(store.clone()));
        let params = BenchmarkParams::new(u64::MAX, 10, 1, Strategy::Sequential);

        assert!(matches!(
            harness.run(&params).await,
            Err(IngestError::InvalidConfig(_))
        ));
        assert!(store.list_tables().await?.is_empty());
        Ok(())
    }
}
