// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Behavior every backend shares, exercised through `Connection::open`

use std::sync::Arc;
use tablestore::{
    Connection, Entity, Error, MAX_BATCH_SIZE, Operation, Result, RetryingStore, TableStore, Value,
};
use tempfile::tempdir;

fn rows(pk: &str, keys: std::ops::Range<u32>) -> Vec<Operation> {
    keys.map(|k| {
        Operation::Upsert(Entity::new(pk, format!("{k:03}")).with_property("k", i64::from(k)))
    })
    .collect()
}

async fn exercise(store: Arc<dyn TableStore>) -> Result<()> {
    assert!(store.create_table_if_absent("bench").await?);
    assert!(!store.create_table_if_absent("bench").await?);
    assert!(matches!(
        store.create_table("bench").await,
        Err(Error::AlreadyExists(_))
    ));

    store.submit_transaction("bench", "batch_1", &rows("batch_1", 0..3)).await?;
    store.submit_transaction("bench", "batch_0", &rows("batch_0", 3..5)).await?;

    // Mixed partitions are rejected as a whole
    let mut mixed = rows("batch_1", 10..12);
    mixed.extend(rows("batch_2", 12..13));
    assert!(matches!(
        store.submit_transaction("bench", "batch_1", &mixed).await,
        Err(Error::TransactionRejected { .. })
    ));

    let oversized = rows("batch_3", 0..(MAX_BATCH_SIZE as u32 + 1));
    assert!(store.submit_transaction("bench", "batch_3", &oversized).await.is_err());

    let all = store.query("bench", None).await?;
    let keys: Vec<_> = all
        .iter()
        .map(|e| (e.partition_key.as_str(), e.row_key.as_str()))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("batch_0", "003"),
            ("batch_0", "004"),
            ("batch_1", "000"),
            ("batch_1", "001"),
            ("batch_1", "002"),
        ]
    );

    // Resubmitting identical keys overwrites in place
    store.submit_transaction("bench", "batch_1", &rows("batch_1", 0..3)).await?;
    assert_eq!(store.query("bench", Some("batch_1")).await?.len(), 3);

    store
        .upsert("bench", Entity::new("batch_0", "003").with_property("k", "replaced"))
        .await?;
    let replaced = store.query("bench", Some("batch_0")).await?;
    assert_eq!(replaced[0].get("k"), Some(&Value::from("replaced")));

    assert!(matches!(
        store.submit_transaction("absent", "p", &rows("p", 0..1)).await,
        Err(Error::TableNotFound(_))
    ));

    store.create_table("results").await?;
    assert_eq!(store.list_tables().await?, vec!["bench", "results"]);
    store.delete_table("bench").await?;
    assert_eq!(store.list_tables().await?, vec!["results"]);
    Ok(())
}

#[tokio::test]
async fn test_memory_backend() -> Result<()> {
    exercise(Connection::parse("memory:")?.open().await?).await
}

#[tokio::test]
async fn test_file_backend() -> Result<()> {
    let dir = tempdir()?;
    let connection = Connection::parse(&format!("file:{}", dir.path().display()))?;
    exercise(connection.open().await?).await
}

#[tokio::test]
async fn test_retrying_backend() -> Result<()> {
    let dir = tempdir()?;
    let inner = Connection::Directory(dir.path().to_path_buf()).open().await?;
    exercise(Arc::new(RetryingStore::new(inner))).await
}
