//! Alerting collaborator. Alerts are fire-and-forget: raising one never
//! blocks or fails the pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::{fmt, sync::Mutex, time::Duration};
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// A raw file could not be relocated after all retries.
    IngestionFailure,
    /// A batch failed structurally or ran out of time.
    BatchAbort,
    /// A committed batch scored below the configured DQ threshold.
    HighDqFailureRate,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::IngestionFailure => "INGESTION_FAILURE",
            AlertKind::BatchAbort => "BATCH_ABORT",
            AlertKind::HighDqFailureRate => "HIGH_DQ_FAILURE_RATE",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub context: Value,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: AlertKind, context: Value) -> Self {
        Self {
            kind,
            context,
            raised_at: Utc::now(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn alert(&self, alert: Alert);
}

/// Emits alerts as structured `error` events.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn alert(&self, alert: Alert) {
        error!(alert = %alert.kind, context = %alert.context, "Pipeline alert");
    }
}

/// Posts alerts as JSON to a webhook from a background task. Delivery errors
/// are logged and dropped.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn alert(&self, alert: Alert) {
        TracingNotifier.alert(alert.clone());

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(alert = %alert.kind, "No async runtime, webhook alert not sent");
            return;
        };

        let client = self.client.clone();
        let url = self.url.clone();
        handle.spawn(async move {
            match client.post(&url).json(&alert).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => warn!(alert = %alert.kind, status = %resp.status(), "Webhook rejected alert"),
                Err(err) => warn!(alert = %alert.kind, %err, "Webhook delivery failed"),
            }
        });
    }
}

/// Keeps alerts in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn count(&self, kind: AlertKind) -> usize {
        self.alerts().iter().filter(|a| a.kind == kind).count()
    }
}

impl Notifier for MemoryNotifier {
    fn alert(&self, alert: Alert) {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push(alert);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    #[test]
    fn alert_serializes_with_screaming_kind() {
        let alert = Alert::new(AlertKind::BatchAbort, json!({ "batch_id": "b1" }));
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["kind"], "BATCH_ABORT");
        assert_eq!(value["context"]["batch_id"], "b1");
    }

    #[test]
    #[traced_test]
    fn tracing_notifier_logs_the_alert() {
        TracingNotifier.alert(Alert::new(AlertKind::IngestionFailure, json!({ "file_id": "f9" })));
        assert!(logs_contain("INGESTION_FAILURE"));
    }

    #[test]
    fn memory_notifier_counts_by_kind() {
        let notifier = MemoryNotifier::new();
        notifier.alert(Alert::new(AlertKind::BatchAbort, Value::Null));
        notifier.alert(Alert::new(AlertKind::HighDqFailureRate, Value::Null));
        notifier.alert(Alert::new(AlertKind::BatchAbort, Value::Null));
        assert_eq!(notifier.count(AlertKind::BatchAbort), 2);
        assert_eq!(notifier.alerts().len(), 3);
    }

    #[test]
    fn webhook_without_runtime_is_a_no_op() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/alerts", Duration::from_millis(50)).unwrap();
        notifier.alert(Alert::new(AlertKind::BatchAbort, Value::Null));
    }
}
