use connectors::postgres::ConnectError;
use engine_config::settings::error::SettingsError;
use engine_core::error::{LedgerError, StoreError};
use engine_runtime::error::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Settings(#[from] SettingsError),

    #[error("Pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Run ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Curated store error: {0}")]
    Store(#[from] StoreError),

    #[error("Connection failed: {0}")]
    Connect(#[from] ConnectError),

    /// PostgreSQL driver error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}
