// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::entity::{Entity, Operation};
use crate::error::{Error, Result};
use crate::store::TableStore;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use diagnostics::*;
use std::future::Future;
use std::time::Duration;

/// Retry decorator for any [`TableStore`]
///
/// Only errors for which [`Error::is_transient`] holds are retried, with
/// exponential backoff. Conflicts and rejected transactions pass straight
/// through: a rejected batch applied nothing, and resubmitting it unchanged
/// would be rejected again.
pub struct RetryingStore<S> {
    inner: S,
    backoff: ExponentialBuilder,
}

impl<S: TableStore> RetryingStore<S> {
    /// Wrap `inner` with the default policy: 4 retries, 50ms doubling up to 2s.
    pub fn new(inner: S) -> Self {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(50))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(4);
        Self::with_backoff(inner, backoff)
    }

    pub fn with_backoff(inner: S, backoff: ExponentialBuilder) -> Self {
        Self { inner, backoff }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn retry<T, F, Fut>(&self, what: &'static str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        op.retry(self.backoff.clone())
            .sleep(tokio::time::sleep)
            .when(Error::is_transient)
            .notify(|err: &Error, delay: Duration| {
                debug!(
                    "Retrying {what} in {delay_ms}ms after: {error}",
                    what: what,
                    delay_ms: delay.as_millis() as u64,
                    error: err.to_string()
                );
            })
            .await
    }
}

#[async_trait]
impl<S: TableStore> TableStore for RetryingStore<S> {
    async fn create_table(&self, name: &str) -> Result<()> {
        let inner = &self.inner;
        self.retry("create_table", move || inner.create_table(name))
            .await
    }

    async fn delete_table(&self, name: &str) -> Result<()> {
        let inner = &self.inner;
        self.retry("delete_table", move || inner.delete_table(name))
            .await
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let inner = &self.inner;
        self.retry("list_tables", move || inner.list_tables()).await
    }

    async fn upsert(&self, table: &str, entity: Entity) -> Result<()> {
        let inner = &self.inner;
        self.retry("upsert", move || inner.upsert(table, entity.clone()))
            .await
    }

    async fn submit_transaction(
        &self,
        table: &str,
        partition_key: &str,
        operations: &[Operation],
    ) -> Result<()> {
        let inner = &self.inner;
        self.retry("submit_transaction", move || {
            inner.submit_transaction(table, partition_key, operations)
        })
        .await
    }

    async fn query(&self, table: &str, partition_key: Option<&str>) -> Result<Vec<Entity>> {
        let inner = &self.inner;
        self.retry("query", move || inner.query(table, partition_key))
            .await
    }
}
