use crate::{
    error::RouterError,
    router::{RouteOutcome, Router},
};
use connectors::{storage::ObjectStore, validator::SchemaValidator};
use engine_core::metrics::Metrics;
use model::{execution::validation::ValidationResult, records::raw::RawFile};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of pushing one arrival through detection, validation and routing.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub validation: Option<ValidationResult>,
    pub outcome: RouteOutcome,
}

/// Front door of the pipeline: reads a raw file, validates it and routes it.
pub struct IngestionService {
    store: Arc<dyn ObjectStore>,
    validator: SchemaValidator,
    router: Router,
    metrics: Metrics,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        validator: SchemaValidator,
        router: Router,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            validator,
            router,
            metrics,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub async fn ingest(&self, file: &RawFile) -> Result<Ingested, RouterError> {
        self.metrics.increment_files_seen(1);

        // Redelivered events for relocated files must not touch storage.
        if let Some(entry) = self.router.journal().get(&file.id)? {
            debug!(file_id = %file.id, "Duplicate arrival event");
            return Ok(Ingested {
                validation: None,
                outcome: RouteOutcome::AlreadyRouted(entry),
            });
        }

        let content = self.store.get(&file.location).await?;
        let result = self.validator.validate(file, &content);

        if result.is_valid {
            self.metrics.increment_files_validated(1);
            info!(
                file_id = %file.id,
                location = %file.location,
                kind = ?result.kind,
                records = result.record_count,
                record_issues = result.record_issues.len(),
                "File passed validation"
            );
        } else {
            self.metrics.increment_validation_failures(1);
            warn!(
                file_id = %file.id,
                location = %file.location,
                unsupported = result.is_unsupported_format(),
                first_error = %result.errors.first().map(|e| e.to_string()).unwrap_or_default(),
                "File failed validation"
            );
        }

        let outcome = self.router.route(file, &content, &result).await?;
        Ok(Ingested {
            validation: Some(result),
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{layout::AreaLayout, router::RouterParams};
    use chrono::Utc;
    use connectors::storage::InMemoryObjectStore;
    use engine_config::settings::validated::AreaPrefixes;
    use engine_core::{
        journal::RelocationJournal, ledger::SledRunLedger, notify::MemoryNotifier,
        retry::RetryPolicy,
    };
    use tracing_test::traced_test;

    fn service(store: Arc<InMemoryObjectStore>, metrics: Metrics) -> IngestionService {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let router = Router::new(RouterParams {
            store: store.clone(),
            journal: RelocationJournal::open(&db).unwrap(),
            layout: AreaLayout::new(AreaPrefixes {
                raw: "raw".into(),
                clean: "validated".into(),
                quarantine: "error".into(),
            }),
            retry: RetryPolicy::none(),
            ledger: Arc::new(SledRunLedger::from_db(&db).unwrap()),
            notifier: Arc::new(MemoryNotifier::new()),
            metrics: metrics.clone(),
        });
        IngestionService::new(store, SchemaValidator::default(), router, metrics)
    }

    #[traced_test]
    #[tokio::test]
    async fn valid_arrival_lands_in_the_clean_area() {
        let store = Arc::new(InMemoryObjectStore::new());
        let metrics = Metrics::new();
        let key = "raw/customer_purchases/2024/o.json";
        let content = br#"[{"CustomerID":"1","Amount":9.5,"Product":"mug","Date":"2024-03-01"}]"#;
        store.put(key, content).await.unwrap();
        let file = RawFile::new("f-1", key, Utc::now());

        let ingested = service(store.clone(), metrics.clone()).ingest(&file).await.unwrap();

        assert!(ingested.validation.unwrap().is_valid);
        let RouteOutcome::Clean(clean) = ingested.outcome else {
            panic!("expected clean routing");
        };
        assert_eq!(clean.location, "validated/customer_purchases/2024/o.json");
        assert_eq!(clean.record_count, 1);
        assert_eq!(metrics.snapshot().files_validated, 1);
        assert!(logs_contain("File passed validation"));
    }

    #[traced_test]
    #[tokio::test]
    async fn redelivered_arrival_does_not_touch_storage() {
        let store = Arc::new(InMemoryObjectStore::new());
        let metrics = Metrics::new();
        let key = "raw/customer_feedback/f.csv";
        store.put(key, b"CustomerID,Rating,Feedback\n1,2,meh\n").await.unwrap();
        let file = RawFile::new("f-2", key, Utc::now());
        let service = service(store.clone(), metrics.clone());

        service.ingest(&file).await.unwrap();
        let again = service.ingest(&file).await.unwrap();

        assert!(again.validation.is_none());
        assert!(matches!(again.outcome, RouteOutcome::AlreadyRouted(_)));
        assert_eq!(store.len().await, 1);
        assert_eq!(metrics.snapshot().files_seen, 2);
        assert_eq!(metrics.snapshot().files_validated, 1);
        assert!(logs_contain("Duplicate arrival event"));
    }
}
