use crate::core::identifiers::BatchId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "POSITIVE",
            SentimentLabel::Neutral => "NEUTRAL",
            SentimentLabel::Negative => "NEGATIVE",
        }
    }

    /// Reads a label out of free-form model output such as `"- Positive"` or
    /// `"Sentiment: negative."`. Checked in positive, negative, neutral order.
    pub fn from_model_output(line: &str) -> Option<Self> {
        let line = line.to_ascii_lowercase();
        if line.contains("positive") {
            Some(SentimentLabel::Positive)
        } else if line.contains("negative") {
            Some(SentimentLabel::Negative)
        } else if line.contains("neutral") {
            Some(SentimentLabel::Neutral)
        } else {
            None
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub rating: u8,
    pub text: String,
    pub sentiment: SentimentLabel,
}

/// Joined view of one customer as written to the curated store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer360Entity {
    pub customer_id: String,
    pub name: String,
    pub city: String,
    pub total_spend: f64,
    pub purchase_count: u64,
    pub last_purchase_date: Option<NaiveDate>,
    pub avg_rating: Option<f64>,
    pub feedback_count: u64,
    pub feedback: Vec<FeedbackEntry>,
    pub dq_score: f64,
    pub batch_id: BatchId,
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_from_model_output() {
        assert_eq!(
            SentimentLabel::from_model_output("- Positive"),
            Some(SentimentLabel::Positive)
        );
        assert_eq!(
            SentimentLabel::from_model_output("2. NEGATIVE (delivery was late)"),
            Some(SentimentLabel::Negative)
        );
        assert_eq!(
            SentimentLabel::from_model_output("neutral"),
            Some(SentimentLabel::Neutral)
        );
        assert_eq!(SentimentLabel::from_model_output("unsure"), None);
    }
}
