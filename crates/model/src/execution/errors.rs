use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Pipeline error taxonomy. Every observed error is either folded into a
/// tally of these kinds or lands in a validation error list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    UnsupportedFormat,
    SchemaViolation,
    ParseFailure,
    OrphanRecord,
    SentimentFailure,
    RelocationFailure,
    BatchAbort,
    PersistenceFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedFormat => "UnsupportedFormat",
            ErrorKind::SchemaViolation => "SchemaViolation",
            ErrorKind::ParseFailure => "ParseFailure",
            ErrorKind::OrphanRecord => "OrphanRecord",
            ErrorKind::SentimentFailure => "SentimentFailure",
            ErrorKind::RelocationFailure => "RelocationFailure",
            ErrorKind::BatchAbort => "BatchAbort",
            ErrorKind::PersistenceFailure => "PersistenceFailure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind error counts for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTally {
    counts: BTreeMap<ErrorKind, u64>,
}

impl ErrorTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: ErrorKind, count: u64) {
        if count == 0 {
            return;
        }
        *self.counts.entry(kind).or_insert(0) += count;
    }

    pub fn incr(&mut self, kind: ErrorKind) {
        self.add(kind, 1);
    }

    pub fn get(&self, kind: ErrorKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn merge(&mut self, other: &ErrorTally) {
        for (kind, count) in &other.counts {
            self.add(*kind, *count);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ErrorKind, u64)> + '_ {
        self.counts.iter().map(|(k, v)| (*k, *v))
    }
}
