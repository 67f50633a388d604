use super::RunLedger;
use crate::error::LedgerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    core::identifiers::{BatchId, RecordId},
    execution::run::RunRecord,
};
use sled::{
    Transactional,
    transaction::{ConflictableTransactionError, TransactionError},
};
use std::path::Path;
use tracing::debug;

const RUNS_TREE: &str = "runs";
const BY_TIME_TREE: &str = "runs_by_time";
const BY_BATCH_TREE: &str = "runs_by_batch";

/// Run ledger on sled: the primary tree keyed by record id plus two index
/// trees, written in one transaction.
#[derive(Debug, Clone)]
pub struct SledRunLedger {
    runs: sled::Tree,
    by_time: sled::Tree,
    by_batch: sled::Tree,
}

impl SledRunLedger {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let db = sled::open(path)?;
        Self::from_db(&db)
    }

    pub fn from_db(db: &sled::Db) -> Result<Self, LedgerError> {
        Ok(Self {
            runs: db.open_tree(RUNS_TREE)?,
            by_time: db.open_tree(BY_TIME_TREE)?,
            by_batch: db.open_tree(BY_BATCH_TREE)?,
        })
    }

    /// Order-preserving encoding of a timestamp.
    #[inline]
    fn time_prefix(ts: &DateTime<Utc>) -> [u8; 8] {
        let nanos = ts
            .timestamp_nanos_opt()
            .unwrap_or_else(|| ts.timestamp().saturating_mul(1_000_000_000));
        ((nanos as u64) ^ (1 << 63)).to_be_bytes()
    }

    fn time_key(record: &RunRecord) -> Vec<u8> {
        let mut key = Self::time_prefix(&record.processed_at).to_vec();
        key.extend_from_slice(record.record_id.as_str().as_bytes());
        key
    }

    fn batch_prefix(batch_id: &BatchId) -> Vec<u8> {
        let mut key = batch_id.as_str().as_bytes().to_vec();
        key.push(0);
        key
    }

    fn batch_key(record: &RunRecord) -> Vec<u8> {
        let mut key = Self::batch_prefix(&record.batch_id);
        key.extend_from_slice(&record.attempt.to_be_bytes());
        key
    }

    fn load(&self, id: &[u8]) -> Result<RunRecord, LedgerError> {
        let bytes = self.runs.get(id)?.ok_or_else(|| {
            LedgerError::CorruptIndex(format!(
                "index points at missing record {}",
                String::from_utf8_lossy(id)
            ))
        })?;
        Ok(bincode::deserialize(&bytes)?)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[async_trait]
impl RunLedger for SledRunLedger {
    async fn append(&self, record: &RunRecord) -> Result<(), LedgerError> {
        let id = record.record_id.as_str().as_bytes();
        let value = bincode::serialize(record)?;
        let time_key = Self::time_key(record);
        let batch_key = Self::batch_key(record);

        let result = (&self.runs, &self.by_time, &self.by_batch).transaction(
            |(runs, by_time, by_batch)| {
                if runs.get(id)?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        LedgerError::DuplicateRecord(record.record_id.clone()),
                    ));
                }
                if by_batch.get(batch_key.as_slice())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        LedgerError::DuplicateAttempt {
                            batch_id: record.batch_id.clone(),
                            attempt: record.attempt,
                        },
                    ));
                }

                runs.insert(id, value.as_slice())?;
                by_time.insert(time_key.as_slice(), id)?;
                by_batch.insert(batch_key.as_slice(), id)?;
                Ok(())
            },
        );

        match result {
            Ok(()) => {}
            Err(TransactionError::Abort(e)) => return Err(e),
            Err(TransactionError::Storage(e)) => return Err(e.into()),
        }

        self.runs.flush_async().await?;
        debug!(
            record_id = %record.record_id,
            batch_id = %record.batch_id,
            attempt = record.attempt,
            status = %record.status,
            "Appended run record"
        );
        Ok(())
    }

    async fn get(&self, record_id: &RecordId) -> Result<Option<RunRecord>, LedgerError> {
        match self.runs.get(record_id.as_str())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn query_by_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RunRecord>, LedgerError> {
        if end <= start {
            return Ok(Vec::new());
        }

        let lower = Self::time_prefix(&start);
        let upper = Self::time_prefix(&end);
        let mut records = Vec::new();
        for item in self.by_time.range(lower..upper) {
            let (_, id) = item?;
            records.push(self.load(&id)?);
        }
        Ok(records)
    }

    async fn find_by_batch(&self, batch_id: &BatchId) -> Result<Vec<RunRecord>, LedgerError> {
        let mut records = Vec::new();
        for item in self.by_batch.scan_prefix(Self::batch_prefix(batch_id)) {
            let (_, id) = item?;
            records.push(self.load(&id)?);
        }
        Ok(records)
    }
}
