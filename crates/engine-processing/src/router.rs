use crate::{error::RouterError, layout::AreaLayout};
use chrono::Utc;
use connectors::storage::{ObjectStore, StorageError};
use engine_core::{
    journal::{RelocationEntry, RelocationJournal, relocation_key},
    ledger::RunLedger,
    metrics::Metrics,
    notify::{Alert, AlertKind, Notifier},
    retry::{RetryDisposition, RetryError, RetryPolicy},
};
use model::{
    core::identifiers::BatchId,
    execution::{
        batch::{BatchContext, CleanFileRef, ValidatedFilePaths},
        errors::ErrorKind,
        run::RunRecord,
        validation::ValidationResult,
    },
    records::raw::RawFile,
};
use serde_json::json;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Moved to the clean area; ready for batching.
    Clean(CleanFileRef),
    /// Moved to quarantine together with its validation sidecar.
    Quarantined { destination: String },
    /// The journal already holds a relocation for this arrival.
    AlreadyRouted(RelocationEntry),
}

/// Moves validated files to the clean area and rejected ones to quarantine.
/// Relocation is idempotent per file id.
pub struct Router {
    store: Arc<dyn ObjectStore>,
    journal: RelocationJournal,
    layout: AreaLayout,
    retry: RetryPolicy,
    ledger: Arc<dyn RunLedger>,
    notifier: Arc<dyn Notifier>,
    metrics: Metrics,
}

pub struct RouterParams {
    pub store: Arc<dyn ObjectStore>,
    pub journal: RelocationJournal,
    pub layout: AreaLayout,
    pub retry: RetryPolicy,
    pub ledger: Arc<dyn RunLedger>,
    pub notifier: Arc<dyn Notifier>,
    pub metrics: Metrics,
}

fn classify(err: &StorageError) -> RetryDisposition {
    if err.is_transient() {
        RetryDisposition::Retry
    } else {
        RetryDisposition::Stop
    }
}

impl Router {
    pub fn new(params: RouterParams) -> Self {
        Self {
            store: params.store,
            journal: params.journal,
            layout: params.layout,
            retry: params.retry,
            ledger: params.ledger,
            notifier: params.notifier,
            metrics: params.metrics,
        }
    }

    pub fn layout(&self) -> &AreaLayout {
        &self.layout
    }

    pub fn journal(&self) -> &RelocationJournal {
        &self.journal
    }

    pub async fn route(
        &self,
        file: &RawFile,
        content: &[u8],
        result: &ValidationResult,
    ) -> Result<RouteOutcome, RouterError> {
        if let Some(entry) = self.journal.get(&file.id)? {
            info!(file_id = %file.id, destination = %entry.destination, "File already routed");
            return Ok(RouteOutcome::AlreadyRouted(entry));
        }

        let destination = self
            .layout
            .destination(&file.location, result.kind, result.is_valid);
        let sidecar = if result.is_valid {
            None
        } else {
            Some((
                AreaLayout::sidecar(&destination),
                serde_json::to_vec_pretty(result)?,
            ))
        };

        let retries = AtomicUsize::new(0);
        let relocated = self
            .retry
            .run(
                "relocate",
                || async {
                    if retries.fetch_add(1, Ordering::Relaxed) > 0 {
                        self.metrics.increment_relocation_retries(1);
                    }
                    self.relocate(&file.location, &destination, content, sidecar.as_ref())
                        .await
                },
                classify,
            )
            .await;

        if let Err(err) = relocated {
            return Err(self.relocation_failed(file, result, destination, err).await);
        }

        let entry = self
            .journal
            .record(RelocationEntry {
                file_id: file.id.clone(),
                key: relocation_key(&file.id, &destination),
                source: file.location.clone(),
                destination: destination.clone(),
                valid: result.is_valid,
                kind: result.kind,
                record_count: result.record_count,
                relocated_at: Utc::now(),
            })
            .await?;

        if !result.is_valid {
            self.metrics.increment_files_quarantined(1);
            warn!(
                file_id = %file.id,
                destination = %entry.destination,
                errors = result.errors.len(),
                "File quarantined"
            );
            return Ok(RouteOutcome::Quarantined {
                destination: entry.destination,
            });
        }

        match entry.kind {
            Some(kind) => {
                info!(file_id = %file.id, destination = %entry.destination, "File routed to clean area");
                Ok(RouteOutcome::Clean(CleanFileRef {
                    file_id: entry.file_id,
                    kind,
                    location: entry.destination,
                    record_count: entry.record_count,
                    arrived_at: file.arrived_at,
                }))
            }
            None => Ok(RouteOutcome::Quarantined {
                destination: entry.destination,
            }),
        }
    }

    /// Put at the destination (and the sidecar), then delete the source.
    /// Every step tolerates repetition.
    async fn relocate(
        &self,
        source: &str,
        destination: &str,
        content: &[u8],
        sidecar: Option<&(String, Vec<u8>)>,
    ) -> Result<(), StorageError> {
        if let Some((key, body)) = sidecar {
            self.store.put(key, body).await?;
        }
        self.store.put(destination, content).await?;
        if source != destination {
            self.store.delete(source).await?;
        }
        Ok(())
    }

    async fn relocation_failed(
        &self,
        file: &RawFile,
        result: &ValidationResult,
        destination: String,
        err: RetryError<StorageError>,
    ) -> RouterError {
        let attempts = err.attempts();
        let source = err.into_inner();
        self.metrics.increment_relocation_failures(1);
        error!(
            file_id = %file.id,
            location = %file.location,
            %destination,
            attempts,
            error = %source,
            "Relocation failed"
        );

        self.notifier.alert(Alert::new(
            AlertKind::IngestionFailure,
            json!({
                "file_id": file.id.as_str(),
                "location": file.location,
                "destination": destination,
                "attempts": attempts,
                "error": source.to_string(),
            }),
        ));

        if let Err(ledger_err) = self.record_failure(file, result, &destination, &source).await {
            error!(file_id = %file.id, error = %ledger_err, "Failed to record relocation failure");
        }

        RouterError::Relocation {
            file_id: file.id.clone(),
            destination,
            attempts,
            source,
        }
    }

    /// FAILED run record referencing the file. Each redelivery that fails
    /// again gets the next attempt number.
    async fn record_failure(
        &self,
        file: &RawFile,
        result: &ValidationResult,
        destination: &str,
        source: &StorageError,
    ) -> Result<(), RouterError> {
        let batch_id = BatchId::from(format!("ingest-{}", file.id));
        let previous = self.ledger.find_by_batch(&batch_id).await?;
        let attempt = previous.last().map(|r| r.attempt + 1).unwrap_or(1);

        let ctx = BatchContext {
            batch_id,
            attempt,
            partition: self.layout.partition(&file.location),
            started_at: Utc::now(),
        };

        let mut paths = ValidatedFilePaths::default();
        if let Some(kind) = result.kind {
            paths.push(kind, file.location.clone());
        }

        let record = RunRecord::aborted(
            &ctx,
            paths,
            result.record_count as u64,
            result.record_count as u64,
            ErrorKind::RelocationFailure,
            format!(
                "relocating '{}' to '{destination}' failed: {source}",
                file.location
            ),
        );
        self.ledger.append(&record).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use connectors::{
        storage::{InMemoryObjectStore, ObjectMeta},
        validator::SchemaValidator,
    };
    use engine_config::settings::validated::AreaPrefixes;
    use engine_core::{ledger::SledRunLedger, notify::MemoryNotifier};
    use model::execution::run::RunStatus;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Fails every `put` to the clean or quarantine areas.
    struct ReadOnlyTarget(InMemoryObjectStore);

    #[async_trait]
    impl ObjectStore for ReadOnlyTarget {
        async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
            self.0.list(prefix).await
        }
        async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            self.0.get(key).await
        }
        async fn put(&self, key: &str, content: &[u8]) -> Result<(), StorageError> {
            if key.starts_with("raw/") {
                self.0.put(key, content).await
            } else {
                Err(StorageError::Unavailable("bucket is read-only".into()))
            }
        }
        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.0.delete(key).await
        }
        async fn exists(&self, key: &str) -> Result<bool, StorageError> {
            self.0.exists(key).await
        }
    }

    struct Harness {
        _dir: TempDir,
        router: Router,
        store: Arc<dyn ObjectStore>,
        ledger: Arc<SledRunLedger>,
        notifier: Arc<MemoryNotifier>,
    }

    fn harness(store: Arc<dyn ObjectStore>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let ledger = Arc::new(SledRunLedger::from_db(&db).unwrap());
        let notifier = Arc::new(MemoryNotifier::new());
        let router = Router::new(RouterParams {
            store: store.clone(),
            journal: RelocationJournal::open(&db).unwrap(),
            layout: AreaLayout::new(AreaPrefixes {
                raw: "raw".into(),
                clean: "validated".into(),
                quarantine: "error".into(),
            }),
            retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2)),
            ledger: ledger.clone(),
            notifier: notifier.clone(),
            metrics: Metrics::new(),
        });
        Harness {
            _dir: dir,
            router,
            store,
            ledger,
            notifier,
        }
    }

    const FEEDBACK: &[u8] = b"CustomerID,Rating,Feedback\n1,5,Great\n";

    async fn arrive(store: &dyn ObjectStore, key: &str, content: &[u8]) -> RawFile {
        store.put(key, content).await.unwrap();
        RawFile::new(format!("id-{key}"), key, Utc::now())
    }

    #[tokio::test]
    async fn second_relocation_is_a_no_op() {
        let h = harness(Arc::new(InMemoryObjectStore::new()));
        let file = arrive(h.store.as_ref(), "raw/customer_feedback/f.csv", FEEDBACK).await;
        let result = SchemaValidator::default().validate(&file, FEEDBACK);

        let first = h.router.route(&file, FEEDBACK, &result).await.unwrap();
        let RouteOutcome::Clean(clean) = first else {
            panic!("expected a clean route, got {first:?}");
        };
        assert_eq!(clean.location, "validated/customer_feedback/f.csv");
        assert!(!h.store.exists("raw/customer_feedback/f.csv").await.unwrap());

        let second = h.router.route(&file, FEEDBACK, &result).await.unwrap();
        assert!(matches!(second, RouteOutcome::AlreadyRouted(ref e) if e.destination == clean.location));
        assert_eq!(h.store.list("validated/").await.unwrap().len(), 1);
        assert_eq!(h.router.journal().len(), 1);
    }

    #[tokio::test]
    async fn rejected_files_get_a_sidecar() {
        let h = harness(Arc::new(InMemoryObjectStore::new()));
        let content = b"CustomerID,Stars\n1,5\n";
        let file = arrive(h.store.as_ref(), "raw/customer_feedback/bad.csv", content).await;
        let result = SchemaValidator::default().validate(&file, content);
        assert!(!result.is_valid);

        let outcome = h.router.route(&file, content, &result).await.unwrap();
        assert_eq!(
            outcome,
            RouteOutcome::Quarantined {
                destination: "error/customer_feedback/bad.csv".into()
            }
        );

        let sidecar = h.store.get("error/customer_feedback/bad.csv.errors.json").await.unwrap();
        let stored: ValidationResult = serde_json::from_slice(&sidecar).unwrap();
        assert_eq!(stored, result);
    }

    #[tokio::test]
    async fn exhausted_relocation_alerts_and_records_a_failed_run() {
        let h = harness(Arc::new(ReadOnlyTarget(InMemoryObjectStore::new())));
        let file = arrive(h.store.as_ref(), "raw/customer_feedback/f.csv", FEEDBACK).await;
        let result = SchemaValidator::default().validate(&file, FEEDBACK);

        let err = h.router.route(&file, FEEDBACK, &result).await.unwrap_err();
        assert!(matches!(err, RouterError::Relocation { attempts: 3, .. }));
        assert_eq!(h.notifier.count(AlertKind::IngestionFailure), 1);
        assert!(h.store.exists("raw/customer_feedback/f.csv").await.unwrap());

        let runs = h
            .ledger
            .find_by_batch(&BatchId::from(format!("ingest-{}", file.id)))
            .await
            .unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert_eq!(runs[0].validated_file_paths.feedback, vec!["raw/customer_feedback/f.csv".to_string()]);

        // Redelivery fails again and is recorded as the next attempt.
        h.router.route(&file, FEEDBACK, &result).await.unwrap_err();
        let runs = h.ledger.find_by_batch(&runs[0].batch_id).await.unwrap();
        assert_eq!(runs.iter().map(|r| r.attempt).collect::<Vec<_>>(), vec![1, 2]);
    }
}
