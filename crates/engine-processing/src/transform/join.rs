//! De-duplication, left join from profiles and per-customer aggregation.
//! Pure functions over already parsed records.

use chrono::NaiveDate;
use model::records::typed::{CustomerRecord, FeedbackRecord, PurchaseRecord};
use std::collections::{BTreeMap, HashSet};

/// Parsed records of one batch, each list in arrival order.
#[derive(Debug, Clone, Default)]
pub struct JoinInput {
    pub profiles: Vec<CustomerRecord>,
    pub purchases: Vec<PurchaseRecord>,
    pub feedback: Vec<FeedbackRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedCustomer {
    pub profile: CustomerRecord,
    pub total_spend: f64,
    pub purchase_count: u64,
    pub last_purchase_date: Option<NaiveDate>,
    pub feedback: Vec<FeedbackRecord>,
}

impl JoinedCustomer {
    fn new(profile: CustomerRecord) -> Self {
        Self {
            profile,
            total_spend: 0.0,
            purchase_count: 0,
            last_purchase_date: None,
            feedback: Vec::new(),
        }
    }

    pub fn avg_rating(&self) -> Option<f64> {
        if self.feedback.is_empty() {
            return None;
        }
        let sum: u32 = self.feedback.iter().map(|f| u32::from(f.rating)).sum();
        Some(f64::from(sum) / self.feedback.len() as f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinOutcome {
    /// One entry per distinct profile, ordered by customer id.
    pub customers: Vec<JoinedCustomer>,
    pub orphan_purchases: u64,
    pub orphan_feedback: u64,
    /// Records dropped as duplicates. Not errors.
    pub duplicates: u64,
}

impl JoinOutcome {
    pub fn orphans(&self) -> u64 {
        self.orphan_purchases + self.orphan_feedback
    }
}

/// Profiles are unique by customer id with the later arrival winning.
/// Purchases are unique by (customer, product, date) and feedback by
/// (customer, text); the first occurrence is kept.
pub fn join(input: JoinInput) -> JoinOutcome {
    let JoinInput {
        profiles,
        purchases,
        feedback,
    } = input;
    let mut outcome = JoinOutcome::default();

    let mut customers: BTreeMap<String, JoinedCustomer> = BTreeMap::new();
    for profile in profiles {
        let id = profile.customer_id.clone();
        if customers.insert(id, JoinedCustomer::new(profile)).is_some() {
            outcome.duplicates += 1;
        }
    }

    let mut seen_purchases = HashSet::new();
    for purchase in purchases {
        let key = (
            purchase.customer_id.clone(),
            purchase.product.clone(),
            purchase.date,
        );
        if !seen_purchases.insert(key) {
            outcome.duplicates += 1;
            continue;
        }

        let Some(customer) = customers.get_mut(&purchase.customer_id) else {
            outcome.orphan_purchases += 1;
            continue;
        };
        customer.total_spend += purchase.amount;
        customer.purchase_count += 1;
        customer.last_purchase_date = customer.last_purchase_date.max(Some(purchase.date));
    }

    let mut seen_feedback = HashSet::new();
    for entry in feedback {
        if !seen_feedback.insert((entry.customer_id.clone(), entry.text.clone())) {
            outcome.duplicates += 1;
            continue;
        }

        match customers.get_mut(&entry.customer_id) {
            Some(customer) => customer.feedback.push(entry),
            None => outcome.orphan_feedback += 1,
        }
    }

    outcome.customers = customers.into_values().collect();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, name: &str) -> CustomerRecord {
        CustomerRecord {
            customer_id: id.into(),
            name: name.into(),
            city: "Porto".into(),
        }
    }

    fn purchase(id: &str, product: &str, amount: f64, date: &str) -> PurchaseRecord {
        PurchaseRecord {
            customer_id: id.into(),
            product: product.into(),
            amount,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        }
    }

    fn feedback(id: &str, rating: u8, text: &str) -> FeedbackRecord {
        FeedbackRecord {
            customer_id: id.into(),
            rating,
            text: text.into(),
        }
    }

    #[test]
    fn every_profile_yields_exactly_one_customer() {
        let out = join(JoinInput {
            profiles: vec![profile("1", "A"), profile("2", "B"), profile("3", "C")],
            purchases: vec![purchase("2", "desk", 10.0, "2024-01-01")],
            feedback: vec![],
        });
        let ids: Vec<_> = out.customers.iter().map(|c| c.profile.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(out.customers[0].purchase_count, 0);
        assert_eq!(out.customers[0].avg_rating(), None);
    }

    #[test]
    fn aggregates_purchases_and_feedback() {
        let out = join(JoinInput {
            profiles: vec![profile("1", "A")],
            purchases: vec![
                purchase("1", "desk", 100.0, "2024-03-01"),
                purchase("1", "lamp", 25.5, "2024-05-10"),
                purchase("1", "chair", 4.5, "2024-04-02"),
            ],
            feedback: vec![feedback("1", 5, "Great"), feedback("1", 2, "Slow")],
        });
        let c = &out.customers[0];
        assert_eq!(c.total_spend, 130.0);
        assert_eq!(c.purchase_count, 3);
        assert_eq!(c.last_purchase_date, NaiveDate::from_ymd_opt(2024, 5, 10));
        assert_eq!(c.avg_rating(), Some(3.5));
        assert_eq!(out.orphans(), 0);
    }

    #[test]
    fn orphans_are_counted_and_excluded() {
        let out = join(JoinInput {
            profiles: vec![profile("1", "A")],
            purchases: vec![purchase("X", "desk", 10.0, "2024-01-01")],
            feedback: vec![feedback("9", 4, "ok")],
        });
        assert_eq!(out.orphan_purchases, 1);
        assert_eq!(out.orphan_feedback, 1);
        assert_eq!(out.customers.len(), 1);
        assert_eq!(out.customers[0].total_spend, 0.0);
    }

    #[test]
    fn duplicates_are_dropped_without_error() {
        let out = join(JoinInput {
            profiles: vec![profile("1", "Old"), profile("1", "New")],
            purchases: vec![
                purchase("1", "desk", 10.0, "2024-01-01"),
                purchase("1", "desk", 10.0, "2024-01-01"),
            ],
            feedback: vec![feedback("1", 5, "Great"), feedback("1", 5, "Great")],
        });
        assert_eq!(out.duplicates, 3);
        assert_eq!(out.customers.len(), 1);
        assert_eq!(out.customers[0].profile.name, "New");
        assert_eq!(out.customers[0].purchase_count, 1);
        assert_eq!(out.customers[0].feedback.len(), 1);
    }
}
