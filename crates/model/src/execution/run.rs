use crate::{
    core::identifiers::{BatchId, RecordId},
    execution::{
        batch::{BatchContext, ValidatedFilePaths},
        errors::{ErrorKind, ErrorTally},
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the run ledger. Append-only: corrections are new records.
///
/// `status` is derived from the error count, never set directly, so
/// `error_count == 0` holds exactly for successful runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub record_id: RecordId,
    pub batch_id: BatchId,
    pub attempt: u32,
    pub partition: String,
    pub status: RunStatus,
    pub dq_score: f64,
    pub error_count: u64,
    pub errors: ErrorTally,
    /// Records considered by the run, including excluded ones.
    pub record_count: u64,
    pub entities_written: u64,
    pub validated_file_paths: ValidatedFilePaths,
    pub failure_reason: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl RunRecord {
    /// Record for a batch that reached the commit boundary. Absorbed
    /// per-record errors still mark the run as failed.
    pub fn completed(
        ctx: &BatchContext,
        paths: ValidatedFilePaths,
        record_count: u64,
        errors: ErrorTally,
        dq_score: f64,
        entities_written: u64,
    ) -> Self {
        let error_count = errors.total();
        let failure_reason =
            (error_count > 0).then(|| format!("{error_count} record-level errors absorbed"));
        Self {
            record_id: RecordId::generate(),
            batch_id: ctx.batch_id.clone(),
            attempt: ctx.attempt,
            partition: ctx.partition.clone(),
            status: status_for(error_count),
            dq_score,
            error_count,
            errors,
            record_count,
            entities_written,
            validated_file_paths: paths,
            failure_reason,
            processed_at: Utc::now(),
        }
    }

    /// Record for a run that never committed. Every unresolved record counts
    /// as an error; at least one error is recorded so the status stays
    /// `FAILED` for empty inputs too.
    pub fn aborted(
        ctx: &BatchContext,
        paths: ValidatedFilePaths,
        record_count: u64,
        unresolved: u64,
        kind: ErrorKind,
        reason: impl Into<String>,
    ) -> Self {
        let mut errors = ErrorTally::new();
        errors.add(kind, unresolved.max(1));
        let error_count = errors.total();
        Self {
            record_id: RecordId::generate(),
            batch_id: ctx.batch_id.clone(),
            attempt: ctx.attempt,
            partition: ctx.partition.clone(),
            status: status_for(error_count),
            dq_score: 0.0,
            error_count,
            errors,
            record_count,
            entities_written: 0,
            validated_file_paths: paths,
            failure_reason: Some(reason.into()),
            processed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// What the transform stage reports back for one trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub record_id: RecordId,
    pub batch_id: BatchId,
    pub attempt: u32,
    pub status: RunStatus,
    pub error_count: u64,
    pub dq_score: f64,
    pub entities_written: u64,
    /// The batch had already been processed; nothing ran.
    pub duplicate: bool,
}

impl RunSummary {
    pub fn of(record: &RunRecord) -> Self {
        Self {
            record_id: record.record_id.clone(),
            batch_id: record.batch_id.clone(),
            attempt: record.attempt,
            status: record.status,
            error_count: record.error_count,
            dq_score: record.dq_score,
            entities_written: record.entities_written,
            duplicate: false,
        }
    }

    pub fn duplicate_of(record: &RunRecord) -> Self {
        Self {
            duplicate: true,
            ..Self::of(record)
        }
    }
}

fn status_for(error_count: u64) -> RunStatus {
    if error_count == 0 {
        RunStatus::Success
    } else {
        RunStatus::Failed
    }
}
