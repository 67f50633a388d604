//! Append-only run history.

use crate::error::LedgerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    core::identifiers::{BatchId, RecordId},
    execution::run::RunRecord,
};

pub mod sled_ledger;

pub use sled_ledger::SledRunLedger;

/// Durable, queryable record of every processing attempt. There is no update
/// or delete: corrections are appended as new records.
#[async_trait]
pub trait RunLedger: Send + Sync {
    /// Create-only. A record is either fully visible through every lookup or
    /// not visible at all.
    async fn append(&self, record: &RunRecord) -> Result<(), LedgerError>;

    async fn get(&self, record_id: &RecordId) -> Result<Option<RunRecord>, LedgerError>;

    /// Records with `start <= processed_at < end`, oldest first.
    async fn query_by_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RunRecord>, LedgerError>;

    /// Every attempt recorded for the batch, by attempt number.
    async fn find_by_batch(&self, batch_id: &BatchId) -> Result<Vec<RunRecord>, LedgerError>;

    async fn latest_attempt(&self, batch_id: &BatchId) -> Result<Option<RunRecord>, LedgerError> {
        Ok(self.find_by_batch(batch_id).await?.pop())
    }
}
