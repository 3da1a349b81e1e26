// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::entity::{Entity, Operation, Value};
use crate::error::{Error, Result};
use async_trait::async_trait;
use diagnostics::*;
use std::sync::Arc;

/// Largest number of operations accepted in one transaction
pub const MAX_BATCH_SIZE: usize = 100;

/// Table-style key-value storage
///
/// Every table holds entities keyed by `(partition_key, row_key)`.
/// `submit_transaction` is atomic per call: either every operation applies or
/// none does. All operations of one transaction must share a partition key.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Create a table. Fails with [`Error::AlreadyExists`] if it is present.
    async fn create_table(&self, name: &str) -> Result<()>;

    /// Create a table unless it already exists.
    ///
    /// Returns `true` when this call created it.
    async fn create_table_if_absent(&self, name: &str) -> Result<bool> {
        match self.create_table(name).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_conflict() => {
                debug!("Table {name} already exists", name: name);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn delete_table(&self, name: &str) -> Result<()>;

    /// Names of all tables, sorted
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Insert or replace a single entity
    async fn upsert(&self, table: &str, entity: Entity) -> Result<()>;

    /// Apply `operations` atomically to one partition of `table`
    async fn submit_transaction(
        &self,
        table: &str,
        partition_key: &str,
        operations: &[Operation],
    ) -> Result<()>;

    /// Read rows ordered by `(partition_key, row_key)`, optionally limited to one partition
    async fn query(&self, table: &str, partition_key: Option<&str>) -> Result<Vec<Entity>>;
}

#[async_trait]
impl<T: TableStore + ?Sized> TableStore for Arc<T> {
    async fn create_table(&self, name: &str) -> Result<()> {
        (**self).create_table(name).await
    }

    async fn create_table_if_absent(&self, name: &str) -> Result<bool> {
        (**self).create_table_if_absent(name).await
    }

    async fn delete_table(&self, name: &str) -> Result<()> {
        (**self).delete_table(name).await
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        (**self).list_tables().await
    }

    async fn upsert(&self, table: &str, entity: Entity) -> Result<()> {
        (**self).upsert(table, entity).await
    }

    async fn submit_transaction(
        &self,
        table: &str,
        partition_key: &str,
        operations: &[Operation],
    ) -> Result<()> {
        (**self)
            .submit_transaction(table, partition_key, operations)
            .await
    }

    async fn query(&self, table: &str, partition_key: Option<&str>) -> Result<Vec<Entity>> {
        (**self).query(table, partition_key).await
    }
}

/// Check a table name: 3-63 ASCII alphanumerics, starting with a letter.
pub fn validate_table_name(name: &str) -> Result<()> {
    let valid = (3..=63).contains(&name.len())
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidTableName(name.to_string()))
    }
}

/// Reject property values a table cannot store.
///
/// Doubles must be finite: NaN and infinities have no JSON form.
pub fn validate_entity(table: &str, entity: &Entity) -> Result<()> {
    for (name, value) in &entity.properties {
        if matches!(value, Value::Double(v) if !v.is_finite()) {
            return Err(Error::rejected(
                table,
                entity.partition_key.as_str(),
                format!("property {name} of row {} is {value}", entity.row_key),
            ));
        }
    }
    Ok(())
}

/// Backend-side transaction checks shared by every store implementation.
pub fn validate_transaction(
    table: &str,
    partition_key: &str,
    operations: &[Operation],
) -> Result<()> {
    if operations.is_empty() {
        return Err(Error::rejected(table, partition_key, "empty transaction"));
    }
    if operations.len() > MAX_BATCH_SIZE {
        return Err(Error::rejected(
            table,
            partition_key,
            format!(
                "{} operations exceeds the limit of {MAX_BATCH_SIZE}",
                operations.len()
            ),
        ));
    }
    if let Some(stray) = operations
        .iter()
        .find(|op| op.partition_key() != partition_key)
    {
        return Err(Error::rejected(
            table,
            partition_key,
            format!(
                "row {} belongs to partition {}",
                stray.row_key(),
                stray.partition_key()
            ),
        ));
    }
    for op in operations {
        validate_entity(table, op.entity())?;
    }
    Ok(())
}
