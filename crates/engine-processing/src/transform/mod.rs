//! Turns a batch of clean files into Customer 360 entities and a DQ score.

pub mod join;

use crate::{
    error::TransformError,
    sentiment::SentimentClassifier,
    transform::join::{JoinInput, JoinOutcome, join},
};
use chrono::Utc;
use connectors::{
    file::{FeedbackSchema, ProfileSchema, PurchaseSchema},
    schema::{FormatSchema, ParsedFile, parse_bytes},
    storage::ObjectStore,
};
use model::{
    core::kind::FileKind,
    execution::{
        batch::{BatchContext, CleanFileRef, TransformTrigger},
        errors::{ErrorKind, ErrorTally},
        quality::DqWeights,
    },
    records::customer::{Customer360Entity, FeedbackEntry, SentimentLabel},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a batch produced before anything is committed.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub entities: Vec<Customer360Entity>,
    pub errors: ErrorTally,
    /// Records seen across all files, valid or not.
    pub record_count: u64,
    pub dq_score: f64,
    pub duplicates: u64,
}

pub struct TransformEngine {
    store: Arc<dyn ObjectStore>,
    classifier: Arc<dyn SentimentClassifier>,
    weights: DqWeights,
}

impl TransformEngine {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        classifier: Arc<dyn SentimentClassifier>,
        weights: DqWeights,
    ) -> Self {
        Self {
            store,
            classifier,
            weights,
        }
    }

    pub fn weights(&self) -> &DqWeights {
        &self.weights
    }

    /// Parse, join, classify and score. Fails only on structural problems
    /// with a clean file; record-level problems are tallied.
    pub async fn compute(
        &self,
        ctx: &BatchContext,
        trigger: &TransformTrigger,
    ) -> Result<TransformOutput, TransformError> {
        let mut input = JoinInput::default();
        let mut errors = ErrorTally::new();
        let mut record_count = 0u64;

        for file in &trigger.files {
            match file.kind {
                FileKind::Profile => {
                    let parsed = self.load::<ProfileSchema>(file).await?;
                    record_count += absorb(&parsed, file, &mut errors);
                    input.profiles.extend(parsed.records);
                }
                FileKind::Purchase => {
                    let parsed = self.load::<PurchaseSchema>(file).await?;
                    record_count += absorb(&parsed, file, &mut errors);
                    input.purchases.extend(parsed.records);
                }
                FileKind::Feedback => {
                    let parsed = self.load::<FeedbackSchema>(file).await?;
                    record_count += absorb(&parsed, file, &mut errors);
                    input.feedback.extend(parsed.records);
                }
            }
        }

        let joined = join(input);
        errors.add(ErrorKind::OrphanRecord, joined.orphans());
        if joined.orphans() > 0 {
            warn!(
                batch_id = %ctx.batch_id,
                orphan_purchases = joined.orphan_purchases,
                orphan_feedback = joined.orphan_feedback,
                "Records without a matching profile excluded"
            );
        }

        let duplicates = joined.duplicates;
        let labelled = self.label(ctx, joined, &mut errors).await;
        let dq_score = self.weights.score(&errors, record_count);

        let processed_at = Utc::now();
        let entities = labelled
            .into_iter()
            .map(|(customer, feedback)| Customer360Entity {
                avg_rating: customer.avg_rating(),
                customer_id: customer.profile.customer_id,
                name: customer.profile.name,
                city: customer.profile.city,
                total_spend: customer.total_spend,
                purchase_count: customer.purchase_count,
                last_purchase_date: customer.last_purchase_date,
                feedback_count: feedback.len() as u64,
                feedback,
                dq_score,
                batch_id: ctx.batch_id.clone(),
                processed_at,
            })
            .collect::<Vec<_>>();

        info!(
            batch_id = %ctx.batch_id,
            attempt = ctx.attempt,
            records = record_count,
            entities = entities.len(),
            errors = errors.total(),
            duplicates,
            dq_score,
            "Batch transformed"
        );

        Ok(TransformOutput {
            entities,
            errors,
            record_count,
            dq_score,
            duplicates,
        })
    }

    async fn load<S>(&self, file: &CleanFileRef) -> Result<ParsedFile<S::Record>, TransformError>
    where
        S: FormatSchema + 'static,
    {
        let bytes = self
            .store
            .get(&file.location)
            .await
            .map_err(|source| TransformError::Unreadable {
                location: file.location.clone(),
                source,
            })?;

        // Parsing is CPU-bound; keep it off the async workers.
        let parsed = tokio::task::spawn_blocking(move || parse_bytes::<S>(&bytes))
            .await
            .map_err(|e| TransformError::Worker(e.to_string()))?;

        parsed.map_err(|source| TransformError::Malformed {
            location: file.location.clone(),
            source,
        })
    }

    /// Classifies the feedback of joined customers. A failed classification
    /// falls back to `NEUTRAL` and counts as an error.
    async fn label(
        &self,
        ctx: &BatchContext,
        joined: JoinOutcome,
        errors: &mut ErrorTally,
    ) -> Vec<(join::JoinedCustomer, Vec<FeedbackEntry>)> {
        let mut out = Vec::with_capacity(joined.customers.len());
        for mut customer in joined.customers {
            let records = std::mem::take(&mut customer.feedback);
            let mut entries = Vec::with_capacity(records.len());
            for record in &records {
                let sentiment = match self.classifier.classify(&record.text).await {
                    Ok(label) => label,
                    Err(err) => {
                        warn!(
                            batch_id = %ctx.batch_id,
                            customer_id = %record.customer_id,
                            error = %err,
                            "Sentiment classification failed, using NEUTRAL"
                        );
                        errors.incr(ErrorKind::SentimentFailure);
                        SentimentLabel::Neutral
                    }
                };
                entries.push(FeedbackEntry {
                    rating: record.rating,
                    text: record.text.clone(),
                    sentiment,
                });
            }
            customer.feedback = records;
            out.push((customer, entries));
        }
        out
    }
}

/// Folds the record-level problems of one file into the tally and returns
/// the number of records it contributed.
fn absorb<T>(parsed: &ParsedFile<T>, file: &CleanFileRef, errors: &mut ErrorTally) -> u64 {
    let rejected = parsed.rejected() as u64;
    if rejected > 0 {
        for issue in &parsed.issues {
            debug!(file_id = %file.file_id, location = %file.location, %issue, "Record excluded");
        }
        warn!(
            file_id = %file.file_id,
            location = %file.location,
            rejected,
            "Records failed to parse"
        );
    }
    errors.add(ErrorKind::ParseFailure, rejected);
    parsed.seen as u64
}
