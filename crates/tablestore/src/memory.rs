// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::entity::{Entity, Operation};
use crate::error::{Error, Result};
use crate::store::{TableStore, validate_entity, validate_table_name, validate_transaction};
use async_trait::async_trait;
use diagnostics::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type Table = BTreeMap<(String, String), Entity>;

/// In-memory table store for tests and throwaway benchmark runs.
///
/// Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryTableStore(Arc<Mutex<State>>);

#[derive(Default)]
pub struct State {
    tables: BTreeMap<String, Table>,
}

impl MemoryTableStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in `table`
    pub async fn row_count(&self, table: &str) -> Result<usize> {
        self.0.lock().await.table(table).map(BTreeMap::len)
    }
}

impl State {
    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    fn create_table(&mut self, name: &str) -> Result<()> {
        validate_table_name(name)?;
        if self.tables.contains_key(name) {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        _ = self.tables.insert(name.to_string(), Table::new());
        Ok(())
    }

    fn submit_transaction(
        &mut self,
        table: &str,
        partition_key: &str,
        operations: &[Operation],
    ) -> Result<()> {
        validate_transaction(table, partition_key, operations)?;
        let rows = self.table_mut(table)?;

        // Nothing below can fail, so the batch lands completely
        for op in operations {
            match op {
                Operation::Upsert(entity) => {
                    _ = rows.insert(entity.key(), entity.clone());
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn create_table(&self, name: &str) -> Result<()> {
        self.0.lock().await.create_table(name)?;
        debug!("Created in-memory table {name}", name: name);
        Ok(())
    }

    async fn delete_table(&self, name: &str) -> Result<()> {
        self.0
            .lock()
            .await
            .tables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.0.lock().await.tables.keys().cloned().collect())
    }

    async fn upsert(&self, table: &str, entity: Entity) -> Result<()> {
        validate_entity(table, &entity)?;
        let mut state = self.0.lock().await;
        _ = state.table_mut(table)?.insert(entity.key(), entity);
        Ok(())
    }

    async fn submit_transaction(
        &self,
        table: &str,
        partition_key: &str,
        operations: &[Operation],
    ) -> Result<()> {
        self.0
            .lock()
            .await
            .submit_transaction(table, partition_key, operations)
    }

    async fn query(&self, table: &str, partition_key: Option<&str>) -> Result<Vec<Entity>> {
        let state = self.0.lock().await;
        Ok(state
            .table(table)?
            .values()
            .filter(|e| partition_key.is_none_or(|pk| e.partition_key == pk))
            .cloned()
            .collect())
    }
}
