use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: String,
    pub name: String,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub customer_id: String,
    pub product: String,
    pub amount: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub customer_id: String,
    /// 1..=5
    pub rating: u8,
    pub text: String,
}

/// Anything that can be joined on the customer key.
pub trait Keyed {
    fn customer_id(&self) -> &str;
}

impl Keyed for CustomerRecord {
    fn customer_id(&self) -> &str {
        &self.customer_id
    }
}

impl Keyed for PurchaseRecord {
    fn customer_id(&self) -> &str {
        &self.customer_id
    }
}

impl Keyed for FeedbackRecord {
    fn customer_id(&self) -> &str {
        &self.customer_id
    }
}
