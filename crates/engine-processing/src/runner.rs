use crate::{
    error::TransformError,
    transform::{TransformEngine, TransformOutput},
    writer::CuratedWriter,
};
use engine_core::{
    ledger::RunLedger,
    metrics::Metrics,
    notify::{Alert, AlertKind, Notifier},
};
use model::execution::{
    batch::{BatchContext, TransformTrigger},
    errors::ErrorKind,
    run::{RunRecord, RunSummary},
};
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{error, info, warn};

/// How a trigger should be treated relative to earlier runs of its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Normal delivery. A batch already in the ledger is not run again.
    Deliver,
    /// Explicit re-run; recorded as the next attempt.
    Replay,
}

/// Drives one batch from trigger to run record: compute under the time
/// budget, commit the entities, append the ledger entry, raise alerts.
pub struct BatchRunner {
    engine: TransformEngine,
    writer: CuratedWriter,
    ledger: Arc<dyn RunLedger>,
    notifier: Arc<dyn Notifier>,
    metrics: Metrics,
    budget: Duration,
    alert_dq_below: f64,
}

pub struct BatchRunnerParams {
    pub engine: TransformEngine,
    pub writer: CuratedWriter,
    pub ledger: Arc<dyn RunLedger>,
    pub notifier: Arc<dyn Notifier>,
    pub metrics: Metrics,
    pub budget: Duration,
    pub alert_dq_below: f64,
}

impl BatchRunner {
    pub fn new(params: BatchRunnerParams) -> Self {
        Self {
            engine: params.engine,
            writer: params.writer,
            ledger: params.ledger,
            notifier: params.notifier,
            metrics: params.metrics,
            budget: params.budget,
            alert_dq_below: params.alert_dq_below,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn RunLedger> {
        &self.ledger
    }

    pub async fn run(&self, trigger: &TransformTrigger, mode: RunMode) -> Result<RunSummary, TransformError> {
        let previous = self.ledger.find_by_batch(&trigger.batch_id).await?;
        let attempt = match (mode, previous.last()) {
            (RunMode::Deliver, Some(last)) => {
                info!(
                    batch_id = %trigger.batch_id,
                    attempt = last.attempt,
                    "Batch already processed, skipping redelivery"
                );
                return Ok(RunSummary::duplicate_of(last));
            }
            (_, last) => last.map(|r| r.attempt + 1).unwrap_or(1),
        };

        let ctx = BatchContext::for_attempt(trigger, attempt);
        info!(
            batch_id = %ctx.batch_id,
            attempt,
            partition = %ctx.partition,
            files = trigger.files.len(),
            "Starting batch"
        );

        let record = match timeout(self.budget, self.engine.compute(&ctx, trigger)).await {
            Ok(Ok(output)) => self.commit(&ctx, trigger, output).await,
            Ok(Err(err)) if err.is_structural() => {
                self.abort(&ctx, trigger, format!("batch aborted: {err}"))
            }
            Ok(Err(err)) => return Err(err),
            Err(_) => self.abort(
                &ctx,
                trigger,
                format!("processing exceeded the {}s budget", self.budget.as_secs_f64()),
            ),
        };

        self.ledger.append(&record).await?;
        self.metrics.increment_batches(1);
        self.metrics.increment_records(record.record_count);
        self.metrics.increment_record_errors(record.error_count);

        info!(
            batch_id = %record.batch_id,
            attempt = record.attempt,
            record_id = %record.record_id,
            status = %record.status,
            error_count = record.error_count,
            dq_score = record.dq_score,
            entities = record.entities_written,
            "Run recorded"
        );
        Ok(RunSummary::of(&record))
    }

    async fn commit(&self, ctx: &BatchContext, trigger: &TransformTrigger, output: TransformOutput) -> RunRecord {
        let TransformOutput {
            entities,
            mut errors,
            record_count,
            ..
        } = output;

        let report = self.writer.write_all(&entities).await;
        errors.add(ErrorKind::PersistenceFailure, report.failed.len() as u64);
        self.metrics.increment_entities(report.written);

        // Recomputed so persistence failures weigh in.
        let dq_score = self.engine.weights().score(&errors, record_count);
        let record = RunRecord::completed(
            ctx,
            trigger.validated_paths(),
            record_count,
            errors,
            dq_score,
            report.written,
        );

        if dq_score < self.alert_dq_below {
            warn!(batch_id = %ctx.batch_id, dq_score, threshold = self.alert_dq_below, "Batch DQ below threshold");
            self.notifier.alert(Alert::new(
                AlertKind::HighDqFailureRate,
                json!({
                    "batch_id": ctx.batch_id.as_str(),
                    "attempt": ctx.attempt,
                    "partition": ctx.partition,
                    "dq_score": dq_score,
                    "threshold": self.alert_dq_below,
                    "error_count": record.error_count,
                    "record_id": record.record_id.as_str(),
                }),
            ));
        }
        record
    }

    /// Nothing of the batch is committed. Every record the validator counted
    /// is unresolved.
    fn abort(&self, ctx: &BatchContext, trigger: &TransformTrigger, reason: String) -> RunRecord {
        let unresolved = trigger.record_count();
        error!(
            batch_id = %ctx.batch_id,
            attempt = ctx.attempt,
            unresolved,
            %reason,
            "Batch aborted"
        );
        self.metrics.increment_batches_aborted(1);

        let record = RunRecord::aborted(
            ctx,
            trigger.validated_paths(),
            unresolved,
            unresolved,
            ErrorKind::BatchAbort,
            reason.clone(),
        );
        self.notifier.alert(Alert::new(
            AlertKind::BatchAbort,
            json!({
                "batch_id": ctx.batch_id.as_str(),
                "attempt": ctx.attempt,
                "partition": ctx.partition,
                "error_count": record.error_count,
                "reason": reason,
                "record_id": record.record_id.as_str(),
            }),
        ));
        record
    }
}
