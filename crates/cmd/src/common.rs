// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use ingest::Strategy;
use tablestore::{Connection, RetryingStore, TableStore};

/// Submission strategy as spelled on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyChoice {
    /// One flush at a time, in trigger order
    Sequential,
    /// Flushes of distinct partitions overlap, bounded by --max-in-flight
    Concurrent,
}

impl From<StrategyChoice> for Strategy {
    fn from(choice: StrategyChoice) -> Self {
        match choice {
            StrategyChoice::Sequential => Strategy::Sequential,
            StrategyChoice::Concurrent => Strategy::Concurrent,
        }
    }
}

/// Where the commands read and write tables
#[derive(Debug, Clone)]
pub struct StoreContext {
    connection: Connection,
}

impl StoreContext {
    /// Use `override_target` when given, otherwise `TABLEBENCH_CONNECTION`,
    /// otherwise local development storage.
    pub fn resolve(override_target: Option<&str>) -> Result<Self> {
        let connection = match override_target {
            Some(target) => Connection::parse(target)
                .with_context(|| format!("Invalid connection target '{target}'"))?,
            None => Connection::from_env()?,
        };
        Ok(Self { connection })
    }

    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Open the store, retrying transient failures
    pub async fn open(&self) -> Result<Arc<dyn TableStore>> {
        let inner = self
            .connection
            .open()
            .await
            .with_context(|| format!("Failed to open {}", self.connection))?;
        Ok(Arc::new(RetryingStore::new(inner)))
    }
}
