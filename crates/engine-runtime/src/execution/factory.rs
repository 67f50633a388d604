use crate::error::PipelineError;
use connectors::storage::{LocalObjectStore, ObjectStore};
use engine_config::settings::validated::{CuratedBackend, SentimentBackend, ValidatedConfig};
use engine_core::{
    curated::{CuratedStore, PostgresCuratedStore, SledCuratedStore},
    notify::{Notifier, TracingNotifier, WebhookNotifier},
};
use engine_processing::sentiment::{HttpSentimentClassifier, LexiconClassifier, SentimentClassifier};
use std::{path::PathBuf, sync::Arc};
use tracing::info;

/// Directory of the sled state database: the configured path, else
/// `~/.c360/state`.
pub fn state_dir(config: &ValidatedConfig) -> Result<PathBuf, PipelineError> {
    if let Some(path) = &config.state_path {
        return Ok(path.clone());
    }
    let home_dir = dirs::home_dir().ok_or_else(|| {
        PipelineError::InitializationError("Could not determine home directory".to_string())
    })?;
    Ok(home_dir.join(".c360/state"))
}

pub fn open_state(config: &ValidatedConfig) -> Result<sled::Db, PipelineError> {
    let path = state_dir(config)?;
    info!(path = %path.display(), "Opening state database");
    Ok(sled::open(path)?)
}

pub async fn create_object_store(config: &ValidatedConfig) -> Result<Arc<dyn ObjectStore>, PipelineError> {
    let store = LocalObjectStore::open(&config.storage_root).await?;
    Ok(Arc::new(store))
}

pub async fn create_curated_store(
    config: &ValidatedConfig,
    db: &sled::Db,
) -> Result<Arc<dyn CuratedStore>, PipelineError> {
    match &config.curated {
        CuratedBackend::Sled => Ok(Arc::new(SledCuratedStore::from_db(db)?)),
        CuratedBackend::Postgres { url, table } => {
            info!(table = %table, "Using PostgreSQL curated store");
            Ok(Arc::new(PostgresCuratedStore::connect(url, table).await?))
        }
    }
}

pub fn create_classifier(config: &ValidatedConfig) -> Result<Arc<dyn SentimentClassifier>, PipelineError> {
    match &config.sentiment {
        SentimentBackend::Lexicon => Ok(Arc::new(LexiconClassifier)),
        SentimentBackend::Http { endpoint, timeout } => {
            info!(endpoint = %endpoint, "Using HTTP sentiment classifier");
            Ok(Arc::new(HttpSentimentClassifier::new(endpoint.clone(), *timeout)?))
        }
    }
}

pub fn create_notifier(config: &ValidatedConfig) -> Result<Arc<dyn Notifier>, PipelineError> {
    match &config.webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(url.clone(), config.notify_timeout)?)),
        None => Ok(Arc::new(TracingNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_config::settings::PipelineConfig;

    #[test]
    fn configured_state_path_wins() {
        let mut config = PipelineConfig::default().validate().unwrap();
        config.state_path = Some(PathBuf::from("/tmp/c360-state"));
        assert_eq!(state_dir(&config).unwrap(), PathBuf::from("/tmp/c360-state"));
    }

    #[tokio::test]
    async fn default_backends_are_local() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default().validate().unwrap();
        config.storage_root = dir.path().join("data");
        let db = sled::open(dir.path().join("state")).unwrap();

        let store = create_object_store(&config).await.unwrap();
        store.put("raw/x.csv", b"1").await.unwrap();
        assert!(dir.path().join("data/raw/x.csv").exists());

        let curated = create_curated_store(&config, &db).await.unwrap();
        assert!(curated.read_all().await.unwrap().is_empty());
        assert!(create_classifier(&config).is_ok());
        assert!(create_notifier(&config).is_ok());
    }
}
