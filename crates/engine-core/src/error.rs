use model::core::identifiers::{BatchId, RecordId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Failed to encode or decode a ledger value: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Run record {0} already exists")]
    DuplicateRecord(RecordId),

    #[error("Batch {batch_id} already has a run record for attempt {attempt}")]
    DuplicateAttempt { batch_id: BatchId, attempt: u32 },

    #[error("Corrupt index entry: {0}")]
    CorruptIndex(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Failed to encode or decode an entity: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Failed to encode feedback: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection failed: {0}")]
    Connect(#[from] connectors::postgres::ConnectError),

    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Invalid table name '{0}'")]
    InvalidTable(String),
}

impl StoreError {
    /// Encoding problems repeat on every attempt; everything else may be a
    /// transient outage.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            StoreError::Codec(_) | StoreError::Json(_) | StoreError::InvalidTable(_)
        )
    }
}
