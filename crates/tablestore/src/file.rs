// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::entity::{Entity, Operation};
use crate::error::{Error, Result};
use crate::store::{TableStore, validate_entity, validate_table_name, validate_transaction};
use async_trait::async_trait;
use diagnostics::*;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const TABLE_SUFFIX: &str = ".table.json";

type Table = BTreeMap<(String, String), Entity>;

/// Directory-backed table store
///
/// Each table is one JSON document `<root>/<table>.table.json`. Writes go to
/// a temporary file that is renamed over the table, so a failed transaction
/// leaves the previous contents in place. Other files in `root` are never
/// listed or touched.
pub struct FileTableStore {
    root: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileTableStore {
    /// Open (creating if needed) a store rooted at `root`
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        debug!("Opened file table store at {root}", root: root.display().to_string());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}{TABLE_SUFFIX}"))
    }

    async fn load(&self, name: &str) -> Result<Table> {
        let bytes = match tokio::fs::read(self.table_path(name)).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::TableNotFound(name.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        let rows: Vec<Entity> = serde_json::from_slice(&bytes)?;
        Ok(rows.into_iter().map(|e| (e.key(), e)).collect())
    }

    async fn store(&self, name: &str, table: &Table) -> Result<()> {
        let rows: Vec<&Entity> = table.values().collect();
        let bytes = serde_json::to_vec(&rows)?;

        let path = self.table_path(name);
        let tmp = self.root.join(format!("{name}{TABLE_SUFFIX}.tmp"));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl TableStore for FileTableStore {
    async fn create_table(&self, name: &str) -> Result<()> {
        validate_table_name(name)?;
        let _guard = self.write_lock.lock().await;

        if tokio::fs::try_exists(self.table_path(name)).await? {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        self.store(name, &Table::new()).await?;
        debug!("Created table file for {name}", name: name);
        Ok(())
    }

    async fn delete_table(&self, name: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.table_path(name)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(Error::TableNotFound(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str().and_then(|f| f.strip_suffix(TABLE_SUFFIX)) else {
                continue;
            };
            if validate_table_name(name).is_ok() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn upsert(&self, table: &str, entity: Entity) -> Result<()> {
        validate_entity(table, &entity)?;
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load(table).await?;
        _ = rows.insert(entity.key(), entity);
        self.store(table, &rows).await
    }

    async fn submit_transaction(
        &self,
        table: &str,
        partition_key: &str,
        operations: &[Operation],
    ) -> Result<()> {
        validate_transaction(table, partition_key, operations)?;
        let _guard = self.write_lock.lock().await;

        let mut rows = self.load(table).await?;
        for op in operations {
            match op {
                Operation::Upsert(entity) => {
                    _ = rows.insert(entity.key(), entity.clone());
                }
            }
        }
        self.store(table, &rows).await
    }

    async fn query(&self, table: &str, partition_key: Option<&str>) -> Result<Vec<Entity>> {
        let rows = self.load(table).await?;
        Ok(rows
            .into_values()
            .filter(|e| partition_key.is_none_or(|pk| e.partition_key == pk))
            .collect())
    }
}
