use connectors::{error::FormatError, storage::StorageError};
use engine_core::error::LedgerError;
use model::core::identifiers::FileId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Journal error: {0}")]
    Journal(#[from] LedgerError),

    #[error("Failed to relocate file '{file_id}' to '{destination}' after {attempts} attempt(s): {source}")]
    Relocation {
        file_id: FileId,
        destination: String,
        attempts: usize,
        #[source]
        source: StorageError,
    },

    #[error("Failed to encode validation sidecar: {0}")]
    Sidecar(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Clean file '{location}' is unreadable: {source}")]
    Unreadable {
        location: String,
        #[source]
        source: StorageError,
    },

    #[error("Clean file '{location}' is structurally broken: {source}")]
    Malformed {
        location: String,
        #[source]
        source: FormatError,
    },

    #[error("Parser task failed: {0}")]
    Worker(String),

    #[error("Run ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl TransformError {
    /// Errors that abort the batch rather than the runner.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TransformError::Unreadable { .. }
                | TransformError::Malformed { .. }
                | TransformError::Worker(_)
        )
    }
}
