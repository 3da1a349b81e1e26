// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use cmd::commands::{RunOptions, SuiteOverrides, cleanup_command, results_command, run_command, suite_command};
use cmd::common::StoreContext;
use ingest::Strategy;
use std::time::Duration;
use tempfile::tempdir;

/// Run, suite, results and cleanup against one directory store, reopened per command
#[tokio::test]
async fn test_command_lifecycle() -> Result<()> {
    let dir = tempdir()?;
    let target = format!("file:{}", dir.path().display());
    let ctx = StoreContext::resolve(Some(&target))?;

    let store = ctx.open().await?;
    let options = RunOptions {
        records: 75,
        batch_size: 20,
        partitions: 3,
        strategy: Strategy::Sequential,
        max_in_flight: 4,
        export: true,
        keep: true,
    };
    let result = run_command(&store, &options).await?;
    assert_eq!(result.record_count, 75);
    // 25 records per partition: one full batch and a drain of 5 each
    assert_eq!(result.batches, 6);

    // Runs are keyed by millisecond timestamps
    tokio::time::sleep(Duration::from_millis(5)).await;

    let store = ctx.open().await?;
    let config = SuiteOverrides {
        records: Some(40),
        batch_sizes: Some(vec![10]),
        partition_counts: Some(vec![1, 4]),
        strategies: Some(vec![Strategy::Concurrent]),
        keep: true,
        ..Default::default()
    }
    .resolve(None)?;
    let report = suite_command(&store, &config).await?;
    assert_eq!(report.results.len(), 2);

    let store = ctx.open().await?;
    let rows = results_command(&store, None).await?;
    assert_eq!(rows.len(), 3);
    let suite_run = rows[2].run.clone();
    assert_eq!(results_command(&store, Some(&suite_run)).await?.len(), 2);

    let store = ctx.open().await?;
    let deleted = cleanup_command(&store).await?;
    assert_eq!(
        deleted,
        vec![
            "benchconcurrent10x1",
            "benchconcurrent10x4",
            "benchsequential20x3"
        ]
    );
    assert_eq!(results_command(&store, None).await?.len(), 3);
    Ok(())
}

/// A directory that already holds other JSON files keeps them through cleanup
#[tokio::test]
async fn test_cleanup_leaves_foreign_files() -> Result<()> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("package.json"), r#"{"name": "app"}"#)?;
    let target = dir.path().display().to_string();
    let ctx = StoreContext::resolve(Some(&target))?;

    let store = ctx.open().await?;
    store.create_table("inventory").await?;
    store.create_table("benchsequential10x1").await?;

    let deleted = cleanup_command(&store).await?;
    assert_eq!(deleted, vec!["benchsequential10x1"]);
    assert_eq!(store.list_tables().await?, vec!["inventory"]);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("package.json"))?,
        r#"{"name": "app"}"#
    );
    Ok(())
}
