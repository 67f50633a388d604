use engine_core::{
    curated::CuratedStore,
    error::StoreError,
    retry::{RetryDisposition, RetryPolicy},
};
use futures::{StreamExt, future::BoxFuture, stream};
use model::records::customer::Customer360Entity;
use std::sync::Arc;
use tracing::{debug, error};

/// Upserts in flight at once for one batch.
const WRITE_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteReport {
    pub written: u64,
    /// Customer id and error of every entity that could not be stored.
    pub failed: Vec<(String, String)>,
}

/// Writes a batch of entities as independent upserts: one failing entity
/// does not hold back the others.
pub struct CuratedWriter {
    store: Arc<dyn CuratedStore>,
    retry: RetryPolicy,
}

fn classify(err: &StoreError) -> RetryDisposition {
    if err.is_transient() {
        RetryDisposition::Retry
    } else {
        RetryDisposition::Stop
    }
}

impl CuratedWriter {
    pub fn new(store: Arc<dyn CuratedStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn store(&self) -> &Arc<dyn CuratedStore> {
        &self.store
    }

    pub async fn write_all(&self, entities: &[Customer360Entity]) -> WriteReport {
        let results: BoxFuture<'_, Vec<_>> = Box::pin(
            stream::iter(entities)
                .map(|entity| async move {
                    let outcome = self
                        .retry
                        .run("upsert", || self.store.upsert(entity), classify)
                        .await;
                    (entity, outcome)
                })
                .buffer_unordered(WRITE_CONCURRENCY)
                .collect::<Vec<_>>(),
        );
        let results = results.await;

        let mut report = WriteReport::default();
        for (entity, outcome) in results {
            match outcome {
                Ok(()) => {
                    debug!(customer_id = %entity.customer_id, "Upserted entity");
                    report.written += 1;
                }
                Err(err) => {
                    error!(
                        customer_id = %entity.customer_id,
                        batch_id = %entity.batch_id,
                        attempts = err.attempts(),
                        error = %err,
                        "Failed to upsert entity"
                    );
                    report
                        .failed
                        .push((entity.customer_id.clone(), err.to_string()));
                }
            }
        }
        report.failed.sort();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use model::core::identifiers::BatchId;
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Rejects one customer id, stores the rest.
    #[derive(Default)]
    struct Picky {
        rejected: String,
        stored: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CuratedStore for Picky {
        async fn upsert(&self, entity: &Customer360Entity) -> Result<(), StoreError> {
            if entity.customer_id == self.rejected {
                return Err(StoreError::InvalidTable("locked".into()));
            }
            self.stored.lock().await.push(entity.customer_id.clone());
            Ok(())
        }

        async fn get(&self, _: &str) -> Result<Option<Customer360Entity>, StoreError> {
            Ok(None)
        }

        async fn read_all(&self) -> Result<Vec<Customer360Entity>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn entity(id: &str) -> Customer360Entity {
        Customer360Entity {
            customer_id: id.into(),
            name: "N".into(),
            city: "C".into(),
            total_spend: 0.0,
            purchase_count: 0,
            last_purchase_date: None,
            avg_rating: None,
            feedback_count: 0,
            feedback: Vec::new(),
            dq_score: 1.0,
            batch_id: BatchId::from("b"),
            processed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_block_the_rest() {
        let store = Arc::new(Picky {
            rejected: "2".into(),
            ..Default::default()
        });
        let writer = CuratedWriter::new(
            store.clone(),
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(1)),
        );

        let report = writer
            .write_all(&[entity("1"), entity("2"), entity("3")])
            .await;

        assert_eq!(report.written, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "2");
        let mut stored = store.stored.lock().await.clone();
        stored.sort();
        assert_eq!(stored, vec!["1", "3"]);
    }
}
