// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

// Error types for table storage operations

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Table already exists: {0}")]
    AlreadyExists(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Invalid table name '{0}': expected 3-63 alphanumerics starting with a letter")]
    InvalidTableName(String),

    #[error("Transaction rejected for {table}/{partition_key}: {reason}")]
    TransactionRejected {
        table: String,
        partition_key: String,
        reason: String,
    },

    #[error("Transient storage failure: {0}")]
    Transient(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid connection string '{0}'")]
    InvalidConnection(String),
}

impl Error {
    pub fn rejected<T: Into<String>, P: Into<String>, R: Into<String>>(
        table: T,
        partition_key: P,
        reason: R,
    ) -> Self {
        Error::TransactionRejected {
            table: table.into(),
            partition_key: partition_key.into(),
            reason: reason.into(),
        }
    }

    /// The destination already exists. Creation races are safe to ignore.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::AlreadyExists(_))
    }

    /// Network-level failures that a caller may retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transient(_) => true,
            Error::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}
