use async_trait::async_trait;
use connectors::storage::{ObjectMeta, ObjectStore, StorageError};
use engine_processing::sentiment::{SentimentClassifier, SentimentError};
use model::records::customer::SentimentLabel;
use std::{sync::Arc, time::Duration};

/// `(id, name, city)` rows as a profile document.
pub fn profiles_xml(rows: &[(&str, &str, &str)]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<Customers>\n");
    for (id, name, city) in rows {
        xml.push_str(&format!(
            "  <Customer><CustomerID>{id}</CustomerID><Name>{name}</Name><City>{city}</City></Customer>\n"
        ));
    }
    xml.push_str("</Customers>\n");
    xml
}

/// `(customer_id, amount, product, date)` rows as a purchase document.
pub fn purchases_json(rows: &[(&str, f64, &str, &str)]) -> String {
    let items: Vec<serde_json::Value> = rows
        .iter()
        .map(|(id, amount, product, date)| {
            serde_json::json!({
                "CustomerID": id,
                "Amount": amount,
                "Product": product,
                "Date": date,
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

/// `(customer_id, rating, text)` rows as a feedback document.
pub fn feedback_csv(rows: &[(&str, u8, &str)]) -> String {
    let mut csv = String::from("CustomerID,Rating,Feedback\n");
    for (id, rating, text) in rows {
        csv.push_str(&format!("{id},{rating},\"{text}\"\n"));
    }
    csv
}

/// Classifier that never answers within a test's time budget.
pub struct StalledClassifier;

#[async_trait]
impl SentimentClassifier for StalledClassifier {
    async fn classify(&self, _text: &str) -> Result<SentimentLabel, SentimentError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(SentimentLabel::Neutral)
    }
}

/// Object store whose clean and quarantine areas reject every write.
pub struct UnreachableDestinations(pub Arc<dyn ObjectStore>);

impl UnreachableDestinations {
    pub fn wrap(inner: Arc<dyn ObjectStore>) -> Arc<dyn ObjectStore> {
        Arc::new(Self(inner))
    }
}

#[async_trait]
impl ObjectStore for UnreachableDestinations {
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
            Err(StorageError::Unavailable(format!("destination for '{key}' is unreachable")))
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.0.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.0.exists(key).await
    }
}
