#![allow(dead_code)]

use connectors::storage::{LocalObjectStore, ObjectStore};
use engine_config::settings::{BatchingConfig, PipelineConfig, validated::ValidatedConfig};
use engine_core::{curated::SledCuratedStore, notify::MemoryNotifier, retry::RetryPolicy};
use engine_processing::sentiment::{LexiconClassifier, SentimentClassifier};
use engine_runtime::{Pipeline, PipelineParts};
use std::{sync::Arc, time::Duration};
use tempfile::TempDir;

pub mod utils;

/// A pipeline over a throwaway directory: object store under `data/`,
/// state database under `state/`.
pub struct TestEnv {
    pub dir: TempDir,
    pub pipeline: Pipeline,
    pub store: Arc<dyn ObjectStore>,
    pub notifier: Arc<MemoryNotifier>,
}

pub struct EnvOptions {
    pub batching: BatchingConfig,
    pub classifier: Arc<dyn SentimentClassifier>,
    pub transform_timeout: Duration,
    /// Wraps the local object store, e.g. to inject failures.
    pub wrap_store: Option<fn(Arc<dyn ObjectStore>) -> Arc<dyn ObjectStore>>,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            batching: BatchingConfig::default(),
            classifier: Arc::new(LexiconClassifier),
            transform_timeout: Duration::from_secs(30),
            wrap_store: None,
        }
    }
}

/// One batch per scan: every file of a scan lands in the same window.
pub fn scan_wide_window() -> BatchingConfig {
    BatchingConfig::Windowed {
        max_files: 100,
        window_secs: 3_600,
    }
}

fn config(dir: &TempDir, options: &EnvOptions) -> ValidatedConfig {
    let mut config = PipelineConfig::default();
    config.storage.root = dir.path().join("data");
    config.state.path = Some(dir.path().join("state"));
    config.batching = options.batching.clone();

    let mut config = config.validate().expect("valid test config");
    config.routing_retry = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2));
    config.persistence_retry = RetryPolicy::none();
    config.transform_timeout = options.transform_timeout;
    config
}

pub async fn test_env(options: EnvOptions) -> TestEnv {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config(&dir, &options);

    let db = sled::open(dir.path().join("state")).expect("open state");
    let local: Arc<dyn ObjectStore> = Arc::new(
        LocalObjectStore::open(&config.storage_root)
            .await
            .expect("open object store"),
    );
    let store = match options.wrap_store {
        Some(wrap) => wrap(local),
        None => local,
    };
    let notifier = Arc::new(MemoryNotifier::new());

    let pipeline = Pipeline::assemble(PipelineParts {
        config,
        curated: Arc::new(SledCuratedStore::from_db(&db).expect("curated tree")),
        db,
        store: store.clone(),
        classifier: options.classifier,
        notifier: notifier.clone(),
    })
    .expect("assemble pipeline");

    TestEnv {
        dir,
        pipeline,
        store,
        notifier,
    }
}

impl TestEnv {
    pub async fn land(&self, key: &str, content: &str) {
        self.store
            .put(&format!("raw/{key}"), content.as_bytes())
            .await
            .expect("land raw file");
    }

    pub async fn keys(&self, prefix: &str) -> Vec<String> {
        self.store
            .list(prefix)
            .await
            .expect("list")
            .into_iter()
            .map(|m| m.key)
            .collect()
    }
}
