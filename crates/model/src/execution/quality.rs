use crate::execution::errors::{ErrorKind, ErrorTally};
use serde::{Deserialize, Serialize};

/// Relative weight of each absorbed error kind in the DQ score. Kinds without
/// a dedicated weight count as 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DqWeights {
    pub parse_failure: f64,
    pub orphan_record: f64,
    pub sentiment_failure: f64,
    pub persistence_failure: f64,
}

impl Default for DqWeights {
    fn default() -> Self {
        Self {
            parse_failure: 1.0,
            orphan_record: 1.0,
            sentiment_failure: 1.0,
            persistence_failure: 1.0,
        }
    }
}

impl DqWeights {
    pub fn weight(&self, kind: ErrorKind) -> f64 {
        match kind {
            ErrorKind::ParseFailure => self.parse_failure,
            ErrorKind::OrphanRecord => self.orphan_record,
            ErrorKind::SentimentFailure => self.sentiment_failure,
            ErrorKind::PersistenceFailure => self.persistence_failure,
            _ => 1.0,
        }
    }

    pub fn weighted_errors(&self, tally: &ErrorTally) -> f64 {
        tally
            .iter()
            .map(|(kind, count)| self.weight(kind) * count as f64)
            .sum()
    }

    /// `1 - weighted_errors / considered`, clamped to `[0, 1]`.
    ///
    /// A batch with any error never scores exactly 1.0, and a batch with no
    /// errors always does, whatever its size.
    pub fn score(&self, tally: &ErrorTally, considered: u64) -> f64 {
        if tally.is_empty() {
            return 1.0;
        }
        if considered == 0 {
            return 0.0;
        }
        let ratio = self.weighted_errors(tally) / considered as f64;
        (1.0 - ratio).clamp(0.0, 1.0 - f64::EPSILON)
    }

    pub fn all_positive(&self) -> bool {
        [
            self.parse_failure,
            self.orphan_record,
            self.sentiment_failure,
            self.persistence_failure,
        ]
        .iter()
        .all(|w| w.is_finite() && *w > 0.0)
    }
}
