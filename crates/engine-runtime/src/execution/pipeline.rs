use crate::{
    error::PipelineError,
    execution::{
        executor::{PartitionedExecutor, TransformExecutor},
        factory,
    },
    watcher::ArrivalWatcher,
};
use connectors::{storage::ObjectStore, validator::SchemaValidator};
use engine_config::settings::validated::ValidatedConfig;
use engine_core::{
    curated::CuratedStore,
    journal::{RelocationEntry, RelocationJournal},
    ledger::{RunLedger, SledRunLedger},
    metrics::Metrics,
    notify::Notifier,
};
use engine_processing::{
    batching::BatchAccumulator,
    error::RouterError,
    ingest::IngestionService,
    layout::AreaLayout,
    router::{RouteOutcome, Router, RouterParams},
    runner::{BatchRunner, BatchRunnerParams, RunMode},
    sentiment::SentimentClassifier,
    transform::TransformEngine,
    writer::CuratedWriter,
};
use futures::future::join_all;
use model::{
    core::identifiers::RecordId,
    execution::{
        batch::{CleanFileRef, TransformTrigger},
        run::RunSummary,
    },
};
use std::{sync::Arc, time::Instant};
use tokio::time::{MissedTickBehavior, interval, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Collaborators of a pipeline. Built from configuration by
/// [`Pipeline::build`]; tests assemble their own.
pub struct PipelineParts {
    pub config: ValidatedConfig,
    pub db: sled::Db,
    pub store: Arc<dyn ObjectStore>,
    pub curated: Arc<dyn CuratedStore>,
    pub classifier: Arc<dyn SentimentClassifier>,
    pub notifier: Arc<dyn Notifier>,
}

/// What one pass over the landing area did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub arrivals: usize,
    pub clean: usize,
    pub quarantined: usize,
    pub duplicates: usize,
    pub ingestion_failures: usize,
    pub triggers: usize,
    /// Summaries of the batches run to completion in this pass. Empty in
    /// watch mode, where runs are only logged.
    pub runs: Vec<RunSummary>,
    /// Batches whose run failed before a record was written. Their files
    /// stay in the clean area and are batched again by the next scan.
    pub unrecorded: usize,
}

pub struct Pipeline {
    config: ValidatedConfig,
    store: Arc<dyn ObjectStore>,
    ingestion: IngestionService,
    executor: Arc<dyn TransformExecutor>,
    ledger: Arc<dyn RunLedger>,
    curated: Arc<dyn CuratedStore>,
    metrics: Metrics,
}

impl Pipeline {
    pub async fn build(config: ValidatedConfig) -> Result<Self, PipelineError> {
        let db = factory::open_state(&config)?;
        let store = factory::create_object_store(&config).await?;
        let curated = factory::create_curated_store(&config, &db).await?;
        let classifier = factory::create_classifier(&config)?;
        let notifier = factory::create_notifier(&config)?;

        Self::assemble(PipelineParts {
            config,
            db,
            store,
            curated,
            classifier,
            notifier,
        })
    }

    pub fn assemble(parts: PipelineParts) -> Result<Self, PipelineError> {
        let PipelineParts {
            config,
            db,
            store,
            curated,
            classifier,
            notifier,
        } = parts;

        let ledger: Arc<dyn RunLedger> = Arc::new(SledRunLedger::from_db(&db)?);
        let metrics = Metrics::new();

        let router = Router::new(RouterParams {
            store: store.clone(),
            journal: RelocationJournal::open(&db)?,
            layout: AreaLayout::new(config.prefixes().clone()),
            retry: config.routing_retry.clone(),
            ledger: ledger.clone(),
            notifier: notifier.clone(),
            metrics: metrics.clone(),
        });
        let ingestion = IngestionService::new(
            store.clone(),
            SchemaValidator::new(config.validation),
            router,
            metrics.clone(),
        );

        let runner = BatchRunner::new(BatchRunnerParams {
            engine: TransformEngine::new(store.clone(), classifier, config.dq_weights),
            writer: CuratedWriter::new(curated.clone(), config.persistence_retry.clone()),
            ledger: ledger.clone(),
            notifier,
            metrics: metrics.clone(),
            budget: config.transform_timeout,
            alert_dq_below: config.alert_dq_below,
        });
        let executor = Arc::new(PartitionedExecutor::new(
            Arc::new(runner),
            config.queue_capacity,
        ));

        Ok(Self {
            config,
            store,
            ingestion,
            executor,
            ledger,
            curated,
            metrics,
        })
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<dyn RunLedger> {
        &self.ledger
    }

    pub fn curated(&self) -> &Arc<dyn CuratedStore> {
        &self.curated
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn layout(&self) -> &AreaLayout {
        self.ingestion.router().layout()
    }

    fn watcher(&self) -> ArrivalWatcher {
        ArrivalWatcher::new(self.store.clone(), self.layout().raw_prefix())
    }

    /// Ingests everything currently in the landing area, closes every open
    /// window and waits for the resulting runs.
    pub async fn scan_once(&self) -> Result<ScanReport, PipelineError> {
        let mut watcher = self.watcher();
        let mut windows = BatchAccumulator::new(self.config.batch_mode());
        let mut report = ScanReport::default();

        let mut triggers = self.ingest_arrivals(&mut watcher, &mut windows, &mut report).await?;
        triggers.extend(windows.flush());
        report.triggers = triggers.len();

        let results = join_all(
            triggers
                .into_iter()
                .map(|trigger| self.executor.execute(trigger, RunMode::Deliver)),
        )
        .await;
        record_runs(&mut report, results);

        self.log_metrics();
        Ok(report)
    }

    /// Polls the landing area until `cancel` fires. Open windows are flushed
    /// and queued batches drained before returning.
    pub async fn watch(&self, cancel: CancellationToken) -> Result<ScanReport, PipelineError> {
        let mut watcher = self.watcher();
        let mut windows = BatchAccumulator::new(self.config.batch_mode());
        let mut report = ScanReport::default();
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            root = %self.config.storage_root.display(),
            poll_ms = self.config.poll_interval.as_millis() as u64,
            "Watching landing area"
        );

        loop {
            let deadline = windows.next_deadline();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.ingest_arrivals(&mut watcher, &mut windows, &mut report).await {
                        Ok(triggers) => self.submit_all(triggers, &mut report).await?,
                        Err(err) => error!(error = %err, "Polling the landing area failed"),
                    }
                }
                _ = window_deadline(deadline) => {
                    let due = windows.due(Instant::now());
                    self.submit_all(due, &mut report).await?;
                }
            }
        }

        info!(pending = windows.pending_files(), "Shutdown requested, flushing open windows");
        let rest = windows.flush();
        self.submit_all(rest, &mut report).await?;
        self.executor.shutdown().await?;

        self.log_metrics();
        Ok(report)
    }

    /// Runs the files of an earlier run again as the next attempt of the
    /// same batch.
    pub async fn replay(&self, record_id: &RecordId) -> Result<RunSummary, PipelineError> {
        let record = self
            .ledger
            .get(record_id)
            .await?
            .ok_or_else(|| PipelineError::RunNotFound(record_id.clone()))?;

        let clean_prefix = self.layout().clean_prefix();
        let journal = self.ingestion.router().journal();
        let mut files = Vec::new();
        for (kind, location) in record.validated_file_paths.iter() {
            if !location.starts_with(&clean_prefix) {
                return Err(PipelineError::NotReplayable {
                    record_id: record_id.clone(),
                    reason: format!(
                        "'{location}' never reached the clean area; the next scan retries it"
                    ),
                });
            }
            let Some(entry) = journal.find_by_destination(location)? else {
                return Err(PipelineError::NotReplayable {
                    record_id: record_id.clone(),
                    reason: format!("no relocation of '{location}' is journaled"),
                });
            };
            files.push(CleanFileRef {
                file_id: entry.file_id,
                kind,
                location: location.to_string(),
                record_count: entry.record_count,
                arrived_at: entry.relocated_at,
            });
        }
        if files.is_empty() {
            return Err(PipelineError::NotReplayable {
                record_id: record_id.clone(),
                reason: "the run consumed no files".to_string(),
            });
        }

        let trigger = TransformTrigger {
            batch_id: record.batch_id.clone(),
            partition: record.partition.clone(),
            window_start: record.processed_at,
            window_end: record.processed_at,
            files,
        };
        info!(
            record_id = %record_id,
            batch_id = %trigger.batch_id,
            previous_attempt = record.attempt,
            "Replaying run"
        );
        self.executor.execute(trigger, RunMode::Replay).await
    }

    pub async fn shutdown(&self) -> Result<(), PipelineError> {
        self.executor.shutdown().await
    }

    async fn ingest_arrivals(
        &self,
        watcher: &mut ArrivalWatcher,
        windows: &mut BatchAccumulator,
        report: &mut ScanReport,
    ) -> Result<Vec<TransformTrigger>, PipelineError> {
        let arrivals = watcher.poll().await?;
        report.arrivals += arrivals.len();

        let mut triggers = Vec::new();
        for file in arrivals {
            let clean = match self.ingestion.ingest(&file).await {
                Ok(ingested) => match ingested.outcome {
                    RouteOutcome::Clean(clean) => {
                        report.clean += 1;
                        clean
                    }
                    RouteOutcome::Quarantined { .. } => {
                        report.quarantined += 1;
                        continue;
                    }
                    RouteOutcome::AlreadyRouted(entry) => {
                        report.duplicates += 1;
                        // Re-batching is harmless: the ledger skips batches
                        // it has already recorded.
                        match clean_ref(entry) {
                            Some(clean) => clean,
                            None => continue,
                        }
                    }
                },
                Err(err) => {
                    report.ingestion_failures += 1;
                    if let RouterError::Relocation { .. } = err {
                        warn!(
                            file_id = %file.id,
                            location = %file.location,
                            "Relocation failed, arrival will be redelivered"
                        );
                    } else {
                        error!(
                            file_id = %file.id,
                            location = %file.location,
                            error = %err,
                            "Ingestion failed"
                        );
                    }
                    watcher.forget(&file.id);
                    continue;
                }
            };

            let partition = self.layout().partition(&clean.location);
            if let Some(trigger) = windows.push(partition, clean, Instant::now()) {
                triggers.push(trigger);
            }
        }
        Ok(triggers)
    }

    async fn submit_all(
        &self,
        triggers: Vec<TransformTrigger>,
        report: &mut ScanReport,
    ) -> Result<(), PipelineError> {
        for trigger in triggers {
            report.triggers += 1;
            self.executor.submit(trigger).await?;
        }
        Ok(())
    }

    fn log_metrics(&self) {
        let m = self.metrics.snapshot();
        info!(
            files_seen = m.files_seen,
            files_validated = m.files_validated,
            files_quarantined = m.files_quarantined,
            validation_failures = m.validation_failures,
            relocation_retries = m.relocation_retries,
            relocation_failures = m.relocation_failures,
            batches = m.batches_processed,
            batches_aborted = m.batches_aborted,
            records = m.records_processed,
            record_errors = m.record_errors,
            entities = m.entities_written,
            "Pipeline metrics"
        );
    }
}

/// Every finished run is reported, even when a sibling batch failed.
fn record_runs(report: &mut ScanReport, results: Vec<Result<RunSummary, PipelineError>>) {
    for result in results {
        match result {
            Ok(summary) => report.runs.push(summary),
            Err(err) => {
                report.unrecorded += 1;
                error!(error = %err, "Batch run ended without a record");
            }
        }
    }
}

fn clean_ref(entry: RelocationEntry) -> Option<CleanFileRef> {
    if !entry.valid {
        return None;
    }
    let Some(kind) = entry.kind else {
        warn!(
            file_id = %entry.file_id,
            destination = %entry.destination,
            "Journaled clean file has no kind, leaving it out of the batch"
        );
        return None;
    };
    Some(CleanFileRef {
        file_id: entry.file_id,
        kind,
        location: entry.destination,
        record_count: entry.record_count,
        arrived_at: entry.relocated_at,
    })
}

async fn window_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}
