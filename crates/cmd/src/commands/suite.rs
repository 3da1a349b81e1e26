// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Suite command - every combination of batch sizes, partition counts and strategies
//!
//! Parameters come from a YAML file, from flags, or from a file with flags
//! layered on top.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use diagnostics::*;
use ingest::{BenchmarkHarness, ResultExporter, Strategy, SuiteConfig, SuiteReport, render_table, run_timestamp};
use tablestore::TableStore;

/// Flag values that replace the corresponding config fields when present
#[derive(Debug, Clone, Default)]
pub struct SuiteOverrides {
    pub records: Option<u64>,
    pub batch_sizes: Option<Vec<usize>>,
    pub partition_counts: Option<Vec<u64>>,
    pub strategies: Option<Vec<Strategy>>,
    pub max_in_flight: Option<usize>,
    pub no_export: bool,
    pub keep: bool,
}

impl SuiteOverrides {
    /// Start from `config_path` (or the defaults) and apply the flags
    pub fn resolve(&self, config_path: Option<&Path>) -> Result<SuiteConfig> {
        let mut config = match config_path {
            Some(path) => SuiteConfig::load(path)
                .with_context(|| format!("Failed to load suite config {}", path.display()))?,
            None => SuiteConfig::default(),
        };

        if let Some(records) = self.records {
            config.record_count = records;
        }
        if let Some(batch_sizes) = &self.batch_sizes {
            config.batch_sizes.clone_from(batch_sizes);
        }
        if let Some(partition_counts) = &self.partition_counts {
            config.partition_counts.clone_from(partition_counts);
        }
        if let Some(strategies) = &self.strategies {
            config.strategies.clone_from(strategies);
        }
        if let Some(max_in_flight) = self.max_in_flight {
            config.max_in_flight = max_in_flight;
        }
        if self.no_export {
            config.export = false;
        }
        if self.keep {
            config.cleanup = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[allow(clippy::print_stdout)]
pub async fn suite_command(store: &Arc<dyn TableStore>, config: &SuiteConfig) -> Result<SuiteReport> {
    let run = run_timestamp(Utc::now());
    info!(
        "Suite {run}: {count} runs of {records} records",
        run: run.as_str(),
        count: config.combinations().len(),
        records: config.record_count
    );

    let harness = BenchmarkHarness::new(Arc::clone(store)).with_cleanup(config.cleanup);
    let report = harness.run_suite(config).await?;

    print!("{}", render_table(&report.results));
    for failed in &report.failures {
        println!("FAILED {}: {}", failed.params, failed.error);
    }

    if config.export && !report.results.is_empty() {
        let exported = ResultExporter::new(Arc::clone(store))
            .export(&run, &report.results)
            .await
            .context("Failed to export suite results")?;
        println!("Exported {exported} results as run {run}");
    }

    if report.results.is_empty() && !report.failures.is_empty() {
        return Err(anyhow!("All {} suite runs failed", report.failures.len()));
    }
    Ok(report)
}
