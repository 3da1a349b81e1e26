// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

// Error types for ingestion runs

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid batch for partition {partition_key}: {reason}")]
    InvalidBatch {
        partition_key: String,
        reason: String,
    },

    #[error(
        "Batch {sequence} of partition {partition_key} ({} rows) was rejected: {source}",
        .row_keys.len()
    )]
    TransactionRejected {
        partition_key: String,
        sequence: u64,
        row_keys: Vec<String>,
        #[source]
        source: tablestore::Error,
    },

    #[error("Storage error: {0}")]
    Store(#[from] tablestore::Error),

    #[error("Flush task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(
        "Ingestion aborted after {submitted} successful batches: {}",
        describe_failures(.failures)
    )]
    Aborted {
        submitted: u64,
        failures: Vec<IngestError>,
    },

    #[error("Malformed result row {run}/{row}: {reason}")]
    MalformedResult {
        run: String,
        row: String,
        reason: String,
    },

    #[error("Suite configuration error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_failures(failures: &[IngestError]) -> String {
    match failures {
        [] => "no failures recorded".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

impl IngestError {
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        IngestError::InvalidConfig(message.into())
    }

    /// Partition key of the failing batch, looking through an abort
    #[must_use]
    pub fn failed_partition(&self) -> Option<&str> {
        match self {
            IngestError::TransactionRejected { partition_key, .. }
            | IngestError::InvalidBatch { partition_key, .. } => Some(partition_key),
            IngestError::Aborted { failures, .. } => {
                failures.iter().find_map(IngestError::failed_partition)
            }
            _ => None,
        }
    }
}
