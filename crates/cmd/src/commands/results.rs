// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use anyhow::{Context, Result};
use ingest::{ResultExporter, ResultRow, render_table};
use tablestore::TableStore;

/// Print stored results, one table per suite run
#[allow(clippy::print_stdout)]
pub async fn results_command(store: &Arc<dyn TableStore>, run: Option<&str>) -> Result<Vec<ResultRow>> {
    let rows = ResultExporter::new(Arc::clone(store))
        .load_results(run)
        .await
        .context("Failed to read results")?;

    if rows.is_empty() {
        match run {
            Some(run) => println!("No results for run {run}"),
            None => println!("No results recorded"),
        }
        return Ok(rows);
    }

    for group in rows.chunk_by(|a, b| a.run == b.run) {
        println!("Run {}", group[0].run);
        print!("{}", render_table(group.iter().map(|row| &row.result)));
        println!();
    }
    Ok(rows)
}
