// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use anyhow::{Context, Result};
use diagnostics::*;
use ingest::{DEFAULT_TABLE_PREFIX, RESULTS_TABLE};
use tablestore::TableStore;

/// Delete every benchmark table, keeping results and tables the harness
/// did not name; returns the deleted names
#[allow(clippy::print_stdout)]
pub async fn cleanup_command(store: &Arc<dyn TableStore>) -> Result<Vec<String>> {
    let tables = store.list_tables().await.context("Failed to list tables")?;
    let mut deleted = Vec::new();

    for table in tables.into_iter().filter(|t| is_benchmark_table(t)) {
        store
            .delete_table(&table)
            .await
            .with_context(|| format!("Failed to delete table {table}"))?;
        info!("Deleted table {table}", table: table.as_str());
        deleted.push(table);
    }

    println!("Deleted {} tables", deleted.len());
    Ok(deleted)
}

fn is_benchmark_table(name: &str) -> bool {
    name != RESULTS_TABLE && name.starts_with(DEFAULT_TABLE_PREFIX)
}
