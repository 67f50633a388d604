use connectors::{postgres::ConnectError, storage::StorageError};
use engine_config::settings::error::SettingsError;
use engine_core::error::{LedgerError, StoreError};
use engine_processing::{
    error::{RouterError, TransformError},
    sentiment::SentimentError,
};
use model::core::identifiers::{BatchId, RecordId};
use thiserror::Error;

/// Top-level errors of the pipeline runtime.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Run ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Curated store error: {0}")]
    Store(#[from] StoreError),

    #[error("Database connection error: {0}")]
    Connect(#[from] ConnectError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sentiment classifier error: {0}")]
    Sentiment(#[from] SentimentError),

    #[error("Ingestion error: {0}")]
    Router(#[from] RouterError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Actor error: {0}")]
    Actor(#[from] ActorError),

    /// A partition worker panicked or was cancelled.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Run record '{0}' not found")]
    RunNotFound(RecordId),

    #[error("Run record '{record_id}' cannot be replayed: {reason}")]
    NotReplayable { record_id: RecordId, reason: String },
}

/// Failures of the partition mailboxes.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("Mailbox of '{0}' is closed")]
    MailboxClosed(String),

    #[error("Worker stopped before reporting on batch '{0}'")]
    ReplyDropped(BatchId),
}
