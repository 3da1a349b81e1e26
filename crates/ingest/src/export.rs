// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Benchmark result persistence and tabulation
//!
//! Results go to their own table, one partition per suite run keyed by the
//! run's UTC timestamp and one row per result keyed by its position.

use crate::benchmark::{BenchmarkResult, Strategy};
use crate::error::{IngestError, Result};
use chrono::{DateTime, Utc};
use diagnostics::*;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tablestore::{Entity, TableStore, Value};

pub const RESULTS_TABLE: &str = "results";

const ELAPSED_SECS: &str = "elapsed_secs";
const THROUGHPUT: &str = "throughput";
const STRATEGY: &str = "strategy";
const BATCH_SIZE: &str = "batch_size";
const PARTITION_COUNT: &str = "partition_count";
const RECORD_COUNT: &str = "record_count";
const BATCHES: &str = "batches";
const ROWS_APPLIED: &str = "rows_applied";
const CONFLICTS: &str = "conflicts";

/// Partition key for a suite run started at `at`, e.g. `20250314T092653.120Z`
#[must_use]
pub fn run_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

/// Row key for the `position`-th result of a run, padded so rows sort in order
#[must_use]
pub fn result_row_key(position: usize) -> String {
    format!("{position:06}")
}

#[must_use]
pub fn result_entity(run: &str, position: usize, result: &BenchmarkResult) -> Entity {
    let entity = Entity::new(run, result_row_key(position))
        .with_property(ELAPSED_SECS, result.elapsed_secs())
        .with_property(STRATEGY, result.strategy.name())
        .with_property(BATCH_SIZE, to_i64(result.batch_size as u64))
        .with_property(PARTITION_COUNT, to_i64(result.partition_count))
        .with_property(RECORD_COUNT, to_i64(result.record_count))
        .with_property(BATCHES, to_i64(result.batches))
        .with_property(ROWS_APPLIED, to_i64(result.rows_applied))
        .with_property(CONFLICTS, to_i64(result.conflicts));
    match result.throughput {
        Some(rate) => entity.with_property(THROUGHPUT, rate),
        None => entity,
    }
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

/// Rebuild a result from a stored row
pub fn result_from_entity(entity: &Entity) -> Result<BenchmarkResult> {
    let malformed = |reason: String| IngestError::MalformedResult {
        run: entity.partition_key.clone(),
        row: entity.row_key.clone(),
        reason,
    };
    let count = |name: &str| -> Result<u64> {
        let value = entity
            .get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| malformed(format!("missing integer column {name}")))?;
        u64::try_from(value).map_err(|_| malformed(format!("negative {name}")))
    };

    let strategy: Strategy = entity
        .get(STRATEGY)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(format!("missing column {STRATEGY}")))?
        .parse()?;
    let elapsed_secs = entity
        .get(ELAPSED_SECS)
        .and_then(Value::as_f64)
        .ok_or_else(|| malformed(format!("missing column {ELAPSED_SECS}")))?;
    let elapsed = Duration::try_from_secs_f64(elapsed_secs)
        .map_err(|err| malformed(format!("{ELAPSED_SECS}: {err}")))?;

    // Columns absent in rows written before they were recorded read as zero
    let optional = |name: &str| entity.get(name).map_or(Ok(0), |_| count(name));

    Ok(BenchmarkResult {
        strategy,
        batch_size: usize::try_from(count(BATCH_SIZE)?)
            .map_err(|_| malformed(format!("{BATCH_SIZE} out of range")))?,
        partition_count: count(PARTITION_COUNT)?,
        record_count: count(RECORD_COUNT)?,
        batches: optional(BATCHES)?,
        rows_applied: optional(ROWS_APPLIED)?,
        conflicts: optional(CONFLICTS)?,
        elapsed,
        throughput: entity.get(THROUGHPUT).and_then(Value::as_f64),
    })
}

/// One stored result and the run it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub run: String,
    pub position: String,
    pub result: BenchmarkResult,
}

/// Appends results to, and reads them back from, the results table
pub struct ResultExporter {
    store: Arc<dyn TableStore>,
    table: String,
}

impl ResultExporter {
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            table: RESULTS_TABLE.to_string(),
        }
    }

    #[must_use]
    pub fn with_table<S: Into<String>>(mut self, table: S) -> Self {
        self.table = table.into();
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Write one row per result under `run`; returns the number of rows written
    pub async fn export(&self, run: &str, results: &[BenchmarkResult]) -> Result<usize> {
        if self.store.create_table_if_absent(&self.table).await? {
            info!("Created results table {table}", table: self.table.as_str());
        }
        for (position, result) in results.iter().enumerate() {
            self.store
                .upsert(&self.table, result_entity(run, position, result))
                .await?;
        }
        info!(
            "Exported {count} results for run {run}",
            count: results.len(),
            run: run
        );
        Ok(results.len())
    }

    /// Stored results ordered by run then position, optionally for a single run.
    ///
    /// A store without a results table has no results.
    pub async fn load_results(&self, run: Option<&str>) -> Result<Vec<ResultRow>> {
        let rows = match self.store.query(&self.table, run).await {
            Ok(rows) => rows,
            Err(tablestore::Error::TableNotFound(_)) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        rows.iter()
            .map(|entity| {
                Ok(ResultRow {
                    run: entity.partition_key.clone(),
                    position: entity.row_key.clone(),
                    result: result_from_entity(entity)?,
                })
            })
            .collect()
    }
}

/// Fixed-width text table of `results`
#[must_use]
pub fn render_table<'a, I>(results: I) -> String
where
    I: IntoIterator<Item = &'a BenchmarkResult>,
{
    let mut out = format!(
        "{:<12} {:>6} {:>10} {:>9} {:>8} {:>9} {:>11} {:>12}\n",
        "strategy", "batch", "partitions", "records", "batches", "conflicts", "elapsed (s)", "records/s"
    );
    for result in results {
        let rate = result
            .throughput
            .map_or_else(|| "n/a".to_string(), |rate| format!("{rate:.1}"));
        // Writing to a String cannot fail
        _ = writeln!(
            out,
            "{:<12} {:>6} {:>10} {:>9} {:>8} {:>9} {:>11.3} {:>12}",
            result.strategy.name(),
            result.batch_size,
            result.partition_count,
            result.record_count,
            result.batches,
            result.conflicts,
            result.elapsed_secs(),
            rate
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tablestore::MemoryTableStore;

    fn result(strategy: Strategy, throughput: Option<f64>) -> BenchmarkResult {
        BenchmarkResult {
            strategy,
            batch_size: 50,
            partition_count: 4,
            record_count: 1000,
            batches: 20,
            rows_applied: 1000,
            conflicts: 0,
            elapsed: Duration::from_millis(2500),
            throughput,
        }
    }

    #[test]
    fn test_run_timestamp_format() {
        let at = Utc
            .with_ymd_and_hms(2025, 3, 14, 9, 26, 53)
            .single()
            .expect("valid date")
            + chrono::Duration::milliseconds(120);
        assert_eq!(run_timestamp(at), "20250314T092653.120Z");
    }

    #[test]
    fn test_entity_columns() -> Result<()> {
        let entity = result_entity("run1", 3, &result(Strategy::Sequential, Some(400.0)));
        assert_eq!(entity.partition_key, "run1");
        assert_eq!(entity.row_key, "000003");
        assert_eq!(entity.get(ELAPSED_SECS), Some(&Value::Double(2.5)));
        assert_eq!(entity.get(THROUGHPUT), Some(&Value::Double(400.0)));
        assert_eq!(entity.get(STRATEGY), Some(&Value::from("sequential")));
        assert_eq!(entity.get(BATCH_SIZE), Some(&Value::Int64(50)));
        assert_eq!(entity.get(ROWS_APPLIED), Some(&Value::Int64(1000)));
        assert_eq!(entity.get(CONFLICTS), Some(&Value::Int64(0)));

        let undefined = result_entity("run1", 0, &result(Strategy::Sequential, None));
        assert!(undefined.get(THROUGHPUT).is_none());

        assert_eq!(result_from_entity(&entity)?, result(Strategy::Sequential, Some(400.0)));
        assert_eq!(result_from_entity(&undefined)?.throughput, None);
        Ok(())
    }

    #[test]
    fn test_conflict_counts_survive_export() -> Result<()> {
        let mut conflicted = result(Strategy::Concurrent, Some(250.0));
        conflicted.rows_applied = 950;
        conflicted.conflicts = 1;

        let entity = result_entity("run1", 0, &conflicted);
        let loaded = result_from_entity(&entity)?;
        assert_eq!(loaded.rows_applied, 950);
        assert_eq!(loaded.conflicts, 1);

        let table = render_table([&loaded]);
        let row = table.lines().nth(1).expect("one result row");
        assert!(row.contains(" 1 "), "conflicts column missing: {row}");
        Ok(())
    }

    #[test]
    fn test_older_rows_without_counts() -> Result<()> {
        let mut entity = result_entity("run1", 0, &result(Strategy::Sequential, Some(400.0)));
        for column in [BATCHES, ROWS_APPLIED, CONFLICTS] {
            _ = entity.properties.remove(column);
        }
        let loaded = result_from_entity(&entity)?;
        assert_eq!((loaded.batches, loaded.rows_applied, loaded.conflicts), (0, 0, 0));
        assert_eq!(loaded.record_count, 1000);
        Ok(())
    }

    #[test]
    fn test_malformed_row() {
        let entity = Entity::new("run1", "000000").with_property(STRATEGY, "sequential");
        assert!(matches!(
            result_from_entity(&entity),
            Err(IngestError::MalformedResult { .. })
        ));
    }

    #[tokio::test]
    async fn test_export_and_load() -> Result<()> {
        let exporter = ResultExporter::new(Arc::new(MemoryTableStore::new()));
        assert!(exporter.load_results(None).await?.is_empty());

        let first = vec![
            result(Strategy::Sequential, Some(100.0)),
            result(Strategy::Concurrent, Some(300.0)),
        ];
        assert_eq!(exporter.export("20250101T000000.000Z", &first).await?, 2);
        let second = vec![result(Strategy::Concurrent, None)];
        assert_eq!(exporter.export("20250102T000000.000Z", &second).await?, 1);

        let all = exporter.load_results(None).await?;
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].result.strategy, Strategy::Concurrent);
        assert_eq!(all[1].position, "000001");

        let one_run = exporter.load_results(Some("20250102T000000.000Z")).await?;
        assert_eq!(one_run.len(), 1);
        assert_eq!(one_run[0].result.throughput, None);
        Ok(())
    }

    #[test]
    fn test_render_table() {
        let results = [
            result(Strategy::Sequential, Some(400.0)),
            result(Strategy::Concurrent, None),
        ];
        let table = render_table(&results);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("strategy"));
        assert!(lines[1].contains("400.0"));
        assert!(lines[1].contains("2.500"));
        assert!(lines[2].ends_with("n/a"));
    }
}
