// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Resolving a connection target to a [`TableStore`]
//!
//! Accepted forms:
//! - `memory:` - a fresh in-memory store
//! - `file:<path>`, `file://<path>` or a bare path - a directory store
//! - `UseDevelopmentStorage=true` - the local development directory
//!
//! When `TABLEBENCH_CONNECTION` is unset the local development directory
//! (`./.tablebench`) is used.

use crate::error::{Error, Result};
use crate::file::FileTableStore;
use crate::memory::MemoryTableStore;
use crate::store::TableStore;
use diagnostics::*;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Environment variable holding the connection string
pub const CONNECTION_ENV: &str = "TABLEBENCH_CONNECTION";

/// Connection string selecting the local development store
pub const DEVELOPMENT_STORAGE: &str = "UseDevelopmentStorage=true";

/// Directory used for local development
pub const DEFAULT_DATA_DIR: &str = ".tablebench";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    Memory,
    Directory(PathBuf),
}

impl Connection {
    /// The documented local-development default
    #[must_use]
    pub fn development() -> Self {
        Connection::Directory(PathBuf::from(DEFAULT_DATA_DIR))
    }

    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::InvalidConnection(value.to_string()));
        }
        if value.eq_ignore_ascii_case(DEVELOPMENT_STORAGE) {
            return Ok(Self::development());
        }
        if matches!(value, "memory:" | "memory://") {
            return Ok(Connection::Memory);
        }
        if let Some(path) = value
            .strip_prefix("file://")
            .or_else(|| value.strip_prefix("file:"))
        {
            if path.is_empty() {
                return Err(Error::InvalidConnection(value.to_string()));
            }
            return Ok(Connection::Directory(PathBuf::from(path)));
        }
        // Remote account strings and other schemes are not supported
        if value.contains('=') || value.contains("://") {
            return Err(Error::InvalidConnection(value.to_string()));
        }
        Ok(Connection::Directory(PathBuf::from(value)))
    }

    /// Resolve from `TABLEBENCH_CONNECTION`, falling back to the development store
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONNECTION_ENV) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                debug!("{var} not set, using local development storage", var: CONNECTION_ENV);
                Ok(Self::development())
            }
        }
    }

    pub async fn open(&self) -> Result<Arc<dyn TableStore>> {
        info!("Connecting to {target}", target: self.to_string());
        let store: Arc<dyn TableStore> = match self {
            Connection::Memory => Arc::new(MemoryTableStore::new()),
            Connection::Directory(path) => Arc::new(FileTableStore::open(path).await?),
        };
        Ok(store)
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connection::Memory => write!(f, "memory:"),
            Connection::Directory(path) => write!(f, "file:{}", path.display()),
        }
    }
}
