use crate::core::{
    identifiers::{BatchId, FileId},
    kind::FileKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A validated file sitting in the clean area, ready for transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanFileRef {
    pub file_id: FileId,
    pub kind: FileKind,
    pub location: String,
    /// Records counted by the validator; used to size aborted batches.
    pub record_count: usize,
    pub arrived_at: DateTime<Utc>,
}

/// Object keys of the files a run consumed, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedFilePaths {
    pub profile: Vec<String>,
    pub purchase: Vec<String>,
    pub feedback: Vec<String>,
}

impl ValidatedFilePaths {
    pub fn push(&mut self, kind: FileKind, location: impl Into<String>) {
        match kind {
            FileKind::Profile => self.profile.push(location.into()),
            FileKind::Purchase => self.purchase.push(location.into()),
            FileKind::Feedback => self.feedback.push(location.into()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileKind, &str)> {
        let p = self.profile.iter().map(|l| (FileKind::Profile, l.as_str()));
        let u = self.purchase.iter().map(|l| (FileKind::Purchase, l.as_str()));
        let f = self.feedback.iter().map(|l| (FileKind::Feedback, l.as_str()));
        p.chain(u).chain(f)
    }

    pub fn len(&self) -> usize {
        self.profile.len() + self.purchase.len() + self.feedback.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Message handed from the router to the transform stage once a batch
/// boundary is reached. Delivered at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformTrigger {
    pub batch_id: BatchId,
    pub partition: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Files in arrival order.
    pub files: Vec<CleanFileRef>,
}

impl TransformTrigger {
    pub fn record_count(&self) -> u64 {
        self.files.iter().map(|f| f.record_count as u64).sum()
    }

    pub fn kinds(&self) -> BTreeSet<FileKind> {
        self.files.iter().map(|f| f.kind).collect()
    }

    pub fn validated_paths(&self) -> ValidatedFilePaths {
        let mut paths = ValidatedFilePaths::default();
        for file in &self.files {
            paths.push(file.kind, file.location.clone());
        }
        paths
    }
}

/// Explicit per-run state threaded through every stage call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchContext {
    pub batch_id: BatchId,
    pub attempt: u32,
    pub partition: String,
    pub started_at: DateTime<Utc>,
}

impl BatchContext {
    pub fn first_attempt(trigger: &TransformTrigger) -> Self {
        Self::for_attempt(trigger, 1)
    }

    pub fn for_attempt(trigger: &TransformTrigger, attempt: u32) -> Self {
        Self {
            batch_id: trigger.batch_id.clone(),
            attempt,
            partition: trigger.partition.clone(),
            started_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str, kind: FileKind, records: usize) -> CleanFileRef {
        CleanFileRef {
            file_id: FileId::from(id),
            kind,
            location: format!("validated/{}/{id}", kind.channel_dir()),
            record_count: records,
            arrived_at: Utc::now(),
        }
    }

    #[test]
    fn trigger_summaries() {
        let now = Utc::now();
        let trigger = TransformTrigger {
            batch_id: BatchId::from("b1"),
            partition: "default".into(),
            window_start: now,
            window_end: now,
            files: vec![
                file("a", FileKind::Profile, 10),
                file("b", FileKind::Feedback, 4),
                file("c", FileKind::Profile, 1),
            ],
        };

        assert_eq!(trigger.record_count(), 15);
        assert_eq!(trigger.kinds().len(), 2);

        let paths = trigger.validated_paths();
        assert_eq!(paths.profile.len(), 2);
        assert_eq!(paths.feedback, vec!["validated/customer_feedback/b".to_string()]);
        assert_eq!(paths.len(), 3);

        let ctx = BatchContext::first_attempt(&trigger);
        assert_eq!(ctx.attempt, 1);
        assert_eq!(ctx.partition, "default");
    }
}
