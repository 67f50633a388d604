//! Sentiment labelling of feedback text.

use async_trait::async_trait;
use model::records::customer::SentimentLabel;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentimentError {
    #[error("Classifier request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Classifier returned no usable label: '{0}'")]
    Unrecognized(String),
}

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<SentimentLabel, SentimentError>;
}

const POSITIVE: &[&str] = &[
    "good", "great", "excellent", "love", "loved", "amazing", "happy", "fast",
    "recommend", "perfect", "satisfied", "friendly", "helpful", "awesome", "best",
    "nice", "fantastic", "easy",
];

const NEGATIVE: &[&str] = &[
    "bad", "poor", "terrible", "hate", "awful", "slow", "late", "broken",
    "disappointed", "disappointing", "worst", "rude", "refund",
    "unhappy", "damaged", "horrible", "missing",
];

const NEGATIONS: &[&str] = &["not", "no", "never", "hardly", "isn't", "wasn't", "don't", "didn't"];

/// Word-list classifier that runs without any external service. A negation
/// directly before a sentiment word flips it.
#[derive(Debug, Clone, Default)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    pub fn label(text: &str) -> SentimentLabel {
        let words: Vec<String> = text
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut score = 0i32;
        for (i, word) in words.iter().enumerate() {
            let polarity = if POSITIVE.contains(&word.as_str()) {
                1
            } else if NEGATIVE.contains(&word.as_str()) {
                -1
            } else {
                continue;
            };
            let negated = i > 0 && NEGATIONS.contains(&words[i - 1].as_str());
            score += if negated { -polarity } else { polarity };
        }

        match score {
            s if s > 0 => SentimentLabel::Positive,
            s if s < 0 => SentimentLabel::Negative,
            _ => SentimentLabel::Neutral,
        }
    }
}

#[async_trait]
impl SentimentClassifier for LexiconClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentLabel, SentimentError> {
        Ok(Self::label(text))
    }
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    #[serde(alias = "sentiment", alias = "output")]
    label: String,
}

/// Calls an external classifier. The service may answer with JSON
/// (`{"label": "positive"}`) or with free text; both are read with
/// [`SentimentLabel::from_model_output`].
#[derive(Debug, Clone)]
pub struct HttpSentimentClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSentimentClassifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SentimentError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SentimentClassifier for HttpSentimentClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentLabel, SentimentError> {
        let body = self
            .client
            .post(&self.endpoint)
            .json(&ClassifyRequest { text })
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let answer = serde_json::from_str::<ClassifyResponse>(&body)
            .map(|r| r.label)
            .unwrap_or(body);

        SentimentLabel::from_model_output(&answer)
            .ok_or_else(|| SentimentError::Unrecognized(answer.trim().chars().take(80).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexicon_labels() {
        assert_eq!(LexiconClassifier::label("Great product, fast delivery!"), SentimentLabel::Positive);
        assert_eq!(LexiconClassifier::label("Arrived late and broken"), SentimentLabel::Negative);
        assert_eq!(LexiconClassifier::label("It is a chair"), SentimentLabel::Neutral);
        assert_eq!(LexiconClassifier::label("not good"), SentimentLabel::Negative);
        assert_eq!(LexiconClassifier::label("good but slow"), SentimentLabel::Neutral);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        let classifier =
            HttpSentimentClassifier::new("http://127.0.0.1:9/classify", Duration::from_millis(200)).unwrap();
        let err = classifier.classify("fine").await.unwrap_err();
        assert!(matches!(err, SentimentError::Http(_)));
    }
}
