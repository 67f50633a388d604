//! TOML configuration of the pipeline. Every section and field is optional;
//! missing values take the defaults below.
//!
//! ```toml
//! [storage]
//! root = "./landing"
//!
//! [batching]
//! mode = "windowed"
//! max_files = 20
//! window_secs = 30
//!
//! [curated]
//! backend = "postgres"
//! url = "postgres://etl@localhost/c360?sslmode=prefer"
//! ```

use crate::settings::{error::SettingsError, validated::ValidatedConfig};
use model::execution::quality::DqWeights;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub mod error;
pub mod validated;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub storage: StorageConfig,
    pub validation: ValidationConfig,
    pub routing: RetryConfig,
    pub batching: BatchingConfig,
    pub transform: TransformConfig,
    pub persistence: RetryConfig,
    pub state: StateConfig,
    pub curated: CuratedConfig,
    pub sentiment: SentimentConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory of the local object store.
    pub root: PathBuf,
    pub raw_prefix: String,
    pub clean_prefix: String,
    pub quarantine_prefix: String,
    pub poll_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            raw_prefix: "raw".into(),
            clean_prefix: "validated".into(),
            quarantine_prefix: "error".into(),
            poll_interval_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    pub max_invalid_record_ratio: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_invalid_record_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

/// When the router closes a batch and triggers the transform. Defaults to a
/// window so profiles, purchases and feedback landing together are joined in
/// one run; `per_file` runs every file on its own.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BatchingConfig {
    PerFile,
    Windowed {
        #[serde(default = "default_max_files")]
        max_files: usize,
        #[serde(default = "default_window_secs")]
        window_secs: u64,
    },
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self::Windowed {
            max_files: default_max_files(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_max_files() -> usize {
    20
}

fn default_window_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    /// Processing-time budget of one batch.
    pub timeout_secs: u64,
    /// Batches scoring below this raise a high-DQ-failure-rate alert.
    pub alert_dq_below: f64,
    /// Capacity of each partition queue.
    pub queue_capacity: usize,
    pub dq_weights: DqWeights,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            alert_dq_below: 0.8,
            queue_capacity: 64,
            dq_weights: DqWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConfig {
    /// sled directory for the run ledger and relocation journal. Defaults to
    /// `~/.c360/state`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CuratedConfig {
    /// Stored next to the ledger.
    #[default]
    Sled,
    Postgres {
        url: String,
        #[serde(default = "default_table")]
        table: String,
    },
}

fn default_table() -> String {
    "customer_360".into()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum SentimentConfig {
    #[default]
    Lexicon,
    /// External classifier answering `{"label": ...}` or free text.
    Http {
        endpoint: String,
        #[serde(default = "default_http_timeout_ms")]
        timeout_ms: u64,
    },
}

fn default_http_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_ms: 5_000,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks every value and freezes the result.
    pub fn validate(self) -> Result<ValidatedConfig, SettingsError> {
        ValidatedConfig::try_from(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.storage.raw_prefix, "raw");
        assert_eq!(
            config.batching,
            BatchingConfig::Windowed {
                max_files: 20,
                window_secs: 60
            }
        );
        assert_eq!(config.curated, CuratedConfig::Sled);
        assert_eq!(config.transform.alert_dq_below, 0.8);
        assert_eq!(config.validation.max_invalid_record_ratio, 0.5);
    }

    #[test]
    fn per_file_batching_is_opt_in() {
        let config = PipelineConfig::from_toml_str("[batching]\nmode = \"per_file\"").unwrap();
        assert_eq!(config.batching, BatchingConfig::PerFile);
    }

    #[test]
    fn parses_tagged_sections() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [batching]
            mode = "windowed"
            max_files = 5

            [curated]
            backend = "postgres"
            url = "postgres://localhost/c360"

            [sentiment]
            backend = "http"
            endpoint = "http://classifier:8080/classify"

            [transform.dq_weights]
            orphan_record = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(
            config.batching,
            BatchingConfig::Windowed {
                max_files: 5,
                window_secs: 60
            }
        );
        assert_eq!(
            config.curated,
            CuratedConfig::Postgres {
                url: "postgres://localhost/c360".into(),
                table: "customer_360".into()
            }
        );
        assert!(matches!(config.sentiment, SentimentConfig::Http { timeout_ms: 5_000, .. }));
        assert_eq!(config.transform.dq_weights.orphan_record, 0.5);
        assert_eq!(config.transform.dq_weights.parse_failure, 1.0);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = PipelineConfig::from_toml_str("[storage]\nrooot = \"x\"").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = PipelineConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
