// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Tablestore - partitioned table-style key-value storage
//!
//! Tables hold entities keyed by partition key and row key. The only
//! multi-row write is [`TableStore::submit_transaction`], which applies a
//! bounded batch of operations against a single partition atomically.
//!
//! Two backends are provided, [`MemoryTableStore`] and [`FileTableStore`],
//! plus the [`RetryingStore`] decorator for transient failures.

mod connection;
mod entity;
mod error;
mod file;
mod memory;
mod retry;
mod store;

pub use connection::{CONNECTION_ENV, Connection, DEFAULT_DATA_DIR, DEVELOPMENT_STORAGE};
pub use entity::{Entity, Operation, Value};
pub use error::{Error, Result};
pub use file::FileTableStore;
pub use memory::MemoryTableStore;
pub use retry::RetryingStore;
pub use backon::ExponentialBuilder;
pub use store::{
    MAX_BATCH_SIZE, TableStore, validate_entity, validate_table_name, validate_transaction,
};
