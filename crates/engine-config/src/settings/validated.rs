use crate::settings::{
    BatchingConfig, CuratedConfig, PipelineConfig, RetryConfig, SentimentConfig,
    error::SettingsError,
};
use connectors::validator::ValidationPolicy;
use engine_core::retry::RetryPolicy;
use model::execution::quality::DqWeights;
use std::{path::PathBuf, time::Duration};

/// Area prefixes of the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaPrefixes {
    pub raw: String,
    pub clean: String,
    pub quarantine: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Every validated file is its own batch.
    PerFile,
    /// Files accumulate until `max_files` or until `window` has elapsed
    /// since the first one.
    Windowed { max_files: usize, window: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CuratedBackend {
    Sled,
    Postgres { url: String, table: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentimentBackend {
    Lexicon,
    Http { endpoint: String, timeout: Duration },
}

/// Immutable, checked configuration shared by every pipeline stage.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub storage_root: PathBuf,
    pub prefixes: AreaPrefixes,
    pub poll_interval: Duration,
    pub validation: ValidationPolicy,
    pub routing_retry: RetryPolicy,
    pub batch_mode: BatchMode,
    pub transform_timeout: Duration,
    pub alert_dq_below: f64,
    pub queue_capacity: usize,
    pub dq_weights: DqWeights,
    pub persistence_retry: RetryPolicy,
    pub state_path: Option<PathBuf>,
    pub curated: CuratedBackend,
    pub sentiment: SentimentBackend,
    pub webhook_url: Option<String>,
    pub notify_timeout: Duration,
}

impl ValidatedConfig {
    pub fn batch_mode(&self) -> BatchMode {
        self.batch_mode
    }

    pub fn prefixes(&self) -> &AreaPrefixes {
        &self.prefixes
    }
}

impl TryFrom<PipelineConfig> for ValidatedConfig {
    type Error = SettingsError;

    fn try_from(config: PipelineConfig) -> Result<Self, Self::Error> {
        let PipelineConfig {
            storage,
            validation,
            routing,
            batching,
            transform,
            persistence,
            state,
            curated,
            sentiment,
            notify,
        } = config;

        let prefixes = AreaPrefixes {
            raw: prefix("storage.raw_prefix", &storage.raw_prefix)?,
            clean: prefix("storage.clean_prefix", &storage.clean_prefix)?,
            quarantine: prefix("storage.quarantine_prefix", &storage.quarantine_prefix)?,
        };
        check_disjoint(&prefixes)?;

        if storage.poll_interval_ms == 0 {
            return Err(SettingsError::invalid("storage.poll_interval_ms", "must be positive"));
        }

        let ratio = validation.max_invalid_record_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(SettingsError::invalid(
                "validation.max_invalid_record_ratio",
                format!("{ratio} is outside [0, 1]"),
            ));
        }

        let batch_mode = match batching {
            BatchingConfig::PerFile => BatchMode::PerFile,
            BatchingConfig::Windowed { max_files, window_secs } => {
                if max_files == 0 {
                    return Err(SettingsError::invalid("batching.max_files", "must be positive"));
                }
                if window_secs == 0 {
                    return Err(SettingsError::invalid("batching.window_secs", "must be positive"));
                }
                BatchMode::Windowed {
                    max_files,
                    window: Duration::from_secs(window_secs),
                }
            }
        };

        if transform.timeout_secs == 0 {
            return Err(SettingsError::invalid("transform.timeout_secs", "must be positive"));
        }
        if !(0.0..=1.0).contains(&transform.alert_dq_below) {
            return Err(SettingsError::invalid(
                "transform.alert_dq_below",
                format!("{} is outside [0, 1]", transform.alert_dq_below),
            ));
        }
        if transform.queue_capacity == 0 {
            return Err(SettingsError::invalid("transform.queue_capacity", "must be positive"));
        }
        if !transform.dq_weights.all_positive() {
            return Err(SettingsError::invalid(
                "transform.dq_weights",
                "every weight must be a finite number greater than zero",
            ));
        }

        let curated = match curated {
            CuratedConfig::Sled => CuratedBackend::Sled,
            CuratedConfig::Postgres { url, table } => {
                if url.trim().is_empty() {
                    return Err(SettingsError::invalid("curated.url", "must not be empty"));
                }
                CuratedBackend::Postgres { url, table }
            }
        };

        let sentiment = match sentiment {
            SentimentConfig::Lexicon => SentimentBackend::Lexicon,
            SentimentConfig::Http { endpoint, timeout_ms } => {
                if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                    return Err(SettingsError::invalid(
                        "sentiment.endpoint",
                        format!("'{endpoint}' is not an http(s) URL"),
                    ));
                }
                SentimentBackend::Http {
                    endpoint,
                    timeout: Duration::from_millis(timeout_ms.max(1)),
                }
            }
        };

        let webhook_url = notify.webhook_url.filter(|url| !url.trim().is_empty());

        Ok(Self {
            storage_root: storage.root,
            prefixes,
            poll_interval: Duration::from_millis(storage.poll_interval_ms),
            validation: ValidationPolicy {
                max_invalid_record_ratio: ratio,
            },
            routing_retry: retry_policy(&routing),
            batch_mode,
            transform_timeout: Duration::from_secs(transform.timeout_secs),
            alert_dq_below: transform.alert_dq_below,
            queue_capacity: transform.queue_capacity,
            dq_weights: transform.dq_weights,
            persistence_retry: retry_policy(&persistence),
            state_path: state.path,
            curated,
            sentiment,
            webhook_url,
            notify_timeout: Duration::from_millis(notify.timeout_ms.max(1)),
        })
    }
}

fn retry_policy(config: &RetryConfig) -> RetryPolicy {
    RetryPolicy::new(
        config.max_attempts,
        Duration::from_millis(config.base_delay_ms),
        Duration::from_millis(config.max_delay_ms),
    )
}

fn prefix(field: &'static str, value: &str) -> Result<String, SettingsError> {
    let trimmed = value.trim_matches('/');
    let ok = !trimmed.is_empty()
        && trimmed
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..");
    if ok {
        Ok(trimmed.to_string())
    } else {
        Err(SettingsError::invalid(field, format!("'{value}' is not a valid key prefix")))
    }
}

fn check_disjoint(prefixes: &AreaPrefixes) -> Result<(), SettingsError> {
    let nested = |a: &str, b: &str| a == b || b.starts_with(&format!("{a}/"));
    let areas = [&prefixes.raw, &prefixes.clean, &prefixes.quarantine];
    for (i, a) in areas.iter().enumerate() {
        for b in areas.iter().skip(i + 1) {
            if nested(a, b) || nested(b, a) {
                return Err(SettingsError::invalid(
                    "storage",
                    format!("areas '{a}' and '{b}' overlap"),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(toml: &str) -> Result<ValidatedConfig, SettingsError> {
        PipelineConfig::from_toml_str(toml)?.validate()
    }

    fn invalid_field(result: Result<ValidatedConfig, SettingsError>) -> &'static str {
        match result {
            Err(SettingsError::Invalid { field, .. }) => field,
            other => panic!("expected an invalid setting, got {other:?}"),
        }
    }

    #[test]
    fn defaults_validate() {
        let config = PipelineConfig::default().validate().unwrap();
        assert_eq!(
            config.batch_mode(),
            BatchMode::Windowed {
                max_files: 20,
                window: Duration::from_secs(60)
            }
        );
        assert_eq!(config.prefixes().clean, "validated");
        assert_eq!(config.transform_timeout, Duration::from_secs(300));
        assert_eq!(config.curated, CuratedBackend::Sled);
        assert_eq!(config.routing_retry.max_attempts, 5);
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn windowed_batching_converts_to_durations() {
        let config = validate("[batching]\nmode = \"windowed\"\nmax_files = 3\nwindow_secs = 9").unwrap();
        assert_eq!(
            config.batch_mode,
            BatchMode::Windowed {
                max_files: 3,
                window: Duration::from_secs(9)
            }
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert_eq!(
            invalid_field(validate("[validation]\nmax_invalid_record_ratio = 1.5")),
            "validation.max_invalid_record_ratio"
        );
        assert_eq!(
            invalid_field(validate("[transform.dq_weights]\norphan_record = 0.0")),
            "transform.dq_weights"
        );
        assert_eq!(
            invalid_field(validate("[transform]\ntimeout_secs = 0")),
            "transform.timeout_secs"
        );
        assert_eq!(
            invalid_field(validate("[batching]\nmode = \"windowed\"\nmax_files = 0")),
            "batching.max_files"
        );
        assert_eq!(
            invalid_field(validate("[sentiment]\nbackend = \"http\"\nendpoint = \"ftp://x\"")),
            "sentiment.endpoint"
        );
    }

    #[test]
    fn areas_must_not_overlap() {
        assert_eq!(
            invalid_field(validate("[storage]\nclean_prefix = \"raw/clean\"")),
            "storage"
        );
        assert_eq!(
            invalid_field(validate("[storage]\nquarantine_prefix = \"../error\"")),
            "storage.quarantine_prefix"
        );
        let ok = validate("[storage]\nraw_prefix = \"/landing/raw/\"").unwrap();
        assert_eq!(ok.prefixes.raw, "landing/raw");
    }
}
