// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Run command - one timed ingestion run
//!
//! Example:
//!   tablebench run --records 10000 --batch-size 100 --partitions 10 --strategy concurrent

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use diagnostics::*;
use ingest::{
    BenchmarkHarness, BenchmarkParams, BenchmarkResult, ResultExporter, Strategy, render_table,
    run_timestamp,
};
use tablestore::TableStore;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub records: u64,
    pub batch_size: usize,
    pub partitions: u64,
    pub strategy: Strategy,
    pub max_in_flight: usize,
    /// Append the result to the results table
    pub export: bool,
    /// Leave the run's table in place afterwards
    pub keep: bool,
}

#[allow(clippy::print_stdout)]
pub async fn run_command(store: &Arc<dyn TableStore>, options: &RunOptions) -> Result<BenchmarkResult> {
    let params = BenchmarkParams::new(
        options.records,
        options.batch_size,
        options.partitions,
        options.strategy,
    )
    .with_max_in_flight(options.max_in_flight);

    let harness = BenchmarkHarness::new(Arc::clone(store)).with_cleanup(!options.keep);
    let table = harness.table_name(&params);
    let result = harness
        .run(&params)
        .await
        .with_context(|| format!("Benchmark run into {table} failed"))?;

    print!("{}", render_table([&result]));

    if options.export {
        let run = run_timestamp(Utc::now());
        _ = ResultExporter::new(Arc::clone(store))
            .export(&run, std::slice::from_ref(&result))
            .await
            .context("Failed to export result")?;
        println!("Exported as run {run}");
    }
    if options.keep {
        debug!("Keeping table {table}", table: table.as_str());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablestore::MemoryTableStore;

    fn options(keep: bool, export: bool) -> RunOptions {
        RunOptions {
            records: 120,
            batch_size: 50,
            partitions: 2,
            strategy: Strategy::Concurrent,
            max_in_flight: 2,
            export,
            keep,
        }
    }

    #[tokio::test]
    async fn test_run_cleans_up_by_default() -> Result<()> {
        let store: Arc<dyn TableStore> = Arc::new(MemoryTableStore::new());
        let result = run_command(&store, &options(false, false)).await?;
        assert_eq!(result.record_count, 120);
        assert_eq!(result.batches, 4);
        assert!(store.list_tables().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_run_keep_and_export() -> Result<()> {
        let store: Arc<dyn TableStore> = Arc::new(MemoryTableStore::new());
        _ = run_command(&store, &options(true, true)).await?;
        assert_eq!(
            store.list_tables().await?,
            vec!["benchconcurrent50x2", "results"]
        );
        assert_eq!(store.query("results", None).await?.len(), 1);
        Ok(())
    }
}
