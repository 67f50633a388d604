use crate::execution::executor::{PartitionedExecutor, TransformExecutor};
use chrono::Utc;
use connectors::storage::{InMemoryObjectStore, ObjectStore};
use engine_core::{
    curated::SledCuratedStore,
    ledger::{RunLedger, SledRunLedger},
    metrics::Metrics,
    notify::MemoryNotifier,
    retry::RetryPolicy,
};
use engine_processing::{
    batching::batch_id_for,
    runner::{BatchRunner, BatchRunnerParams, RunMode},
    sentiment::LexiconClassifier,
    transform::TransformEngine,
    writer::CuratedWriter,
};
use model::{
    core::{identifiers::FileId, kind::FileKind},
    execution::{
        batch::{CleanFileRef, TransformTrigger},
        quality::DqWeights,
        run::RunStatus,
    },
};
use std::{sync::Arc, time::Duration};

struct Fixture {
    store: Arc<InMemoryObjectStore>,
    ledger: Arc<SledRunLedger>,
    executor: PartitionedExecutor,
}

fn fixture() -> Fixture {
    let db = sled::Config::new().temporary(true).open().unwrap();
    let store = Arc::new(InMemoryObjectStore::new());
    let ledger = Arc::new(SledRunLedger::from_db(&db).unwrap());
    let runner = BatchRunner::new(BatchRunnerParams {
        engine: TransformEngine::new(store.clone(), Arc::new(LexiconClassifier), DqWeights::default()),
        writer: CuratedWriter::new(
            Arc::new(SledCuratedStore::from_db(&db).unwrap()),
            RetryPolicy::none(),
        ),
        ledger: ledger.clone(),
        notifier: Arc::new(MemoryNotifier::new()),
        metrics: Metrics::new(),
        budget: Duration::from_secs(10),
        alert_dq_below: 0.8,
    });
    Fixture {
        store,
        ledger,
        executor: PartitionedExecutor::new(Arc::new(runner), 4),
    }
}

async fn profile_trigger(store: &InMemoryObjectStore, partition: &str, n: usize) -> TransformTrigger {
    let key = format!("validated/customer_details/{partition}/p{n}.xml");
    let xml = format!(
        "<Customers><Customer><CustomerID>{n}</CustomerID><Name>C{n}</Name><City>X</City></Customer></Customers>"
    );
    store.put(&key, xml.as_bytes()).await.unwrap();
    let files = vec![CleanFileRef {
        file_id: FileId::new(format!("{partition}-{n}")),
        kind: FileKind::Profile,
        location: key,
        record_count: 1,
        arrived_at: Utc::now(),
    }];
    TransformTrigger {
        batch_id: batch_id_for(partition, &files),
        partition: partition.to_string(),
        window_start: Utc::now(),
        window_end: Utc::now(),
        files,
    }
}

#[tokio::test]
async fn runs_within_a_partition_follow_submission_order() {
    let f = fixture();
    let mut batches = Vec::new();
    for n in 0..4 {
        let trigger = profile_trigger(&f.store, "eu", n).await;
        batches.push(trigger.batch_id.clone());
        f.executor.submit(trigger).await.unwrap();
    }
    f.executor.shutdown().await.unwrap();

    let mut processed = Vec::new();
    for batch in &batches {
        let runs = f.ledger.find_by_batch(batch).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Success);
        processed.push(runs[0].processed_at);
    }
    assert!(processed.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn partitions_report_independently() {
    let f = fixture();
    let eu = profile_trigger(&f.store, "eu", 1).await;
    let us = profile_trigger(&f.store, "us", 2).await;

    let (a, b) = tokio::join!(
        f.executor.execute(eu.clone(), RunMode::Deliver),
        f.executor.execute(us, RunMode::Deliver)
    );
    assert_eq!(a.unwrap().entities_written, 1);
    assert_eq!(b.unwrap().entities_written, 1);

    let again = f.executor.execute(eu, RunMode::Deliver).await.unwrap();
    assert!(again.duplicate);
    f.executor.shutdown().await.unwrap();
}
