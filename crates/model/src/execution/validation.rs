use crate::core::{identifiers::FileId, kind::FileKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    /// Neither the channel nor the content identify a supported format.
    UnsupportedFormat,
    /// Content cannot be parsed as the expected format.
    Malformed,
    /// The document parsed but holds no records.
    Empty,
    MissingField,
    InvalidValue,
    /// Too many invalid records for the file to be accepted.
    RejectedRecords,
}

/// A single schema violation. `record` is the 1-based position of the
/// offending record; `None` for file-level problems.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    pub code: ViolationCode,
    pub record: Option<usize>,
    pub field: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn file(code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            record: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn record(
        record: usize,
        field: Option<&str>,
        code: ViolationCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            record: Some(record),
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn is_structural(&self) -> bool {
        self.record.is_none()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.record, &self.field) {
            (Some(r), Some(field)) => write!(f, "record {r}, field {field}: {}", self.message),
            (Some(r), None) => write!(f, "record {r}: {}", self.message),
            (None, Some(field)) => write!(f, "field {field}: {}", self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

/// Verdict of the format detector and schema validator for one raw file.
///
/// Equality compares the verdict only; `validated_at` is bookkeeping and
/// is ignored so that validating the same content twice compares equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub file_id: FileId,
    pub kind: Option<FileKind>,
    pub is_valid: bool,
    /// Fatal violations, in discovery order. Empty iff `is_valid`.
    pub errors: Vec<Violation>,
    /// Per-record violations tolerated under the record policy.
    pub record_issues: Vec<Violation>,
    pub record_count: usize,
    pub invalid_records: usize,
    pub validated_at: DateTime<Utc>,
}

impl PartialEq for ValidationResult {
    fn eq(&self, other: &Self) -> bool {
        self.file_id == other.file_id
            && self.kind == other.kind
            && self.is_valid == other.is_valid
            && self.errors == other.errors
            && self.record_issues == other.record_issues
            && self.record_count == other.record_count
            && self.invalid_records == other.invalid_records
    }
}

impl Eq for ValidationResult {}

impl ValidationResult {
    pub fn unsupported(file_id: FileId, message: impl Into<String>) -> Self {
        Self {
            file_id,
            kind: None,
            is_valid: false,
            errors: vec![Violation::file(ViolationCode::UnsupportedFormat, message)],
            record_issues: Vec::new(),
            record_count: 0,
            invalid_records: 0,
            validated_at: Utc::now(),
        }
    }

    pub fn is_unsupported_format(&self) -> bool {
        self.errors
            .iter()
            .any(|v| v.code == ViolationCode::UnsupportedFormat)
    }

    /// Records expected to parse cleanly downstream.
    pub fn valid_records(&self) -> usize {
        self.record_count.saturating_sub(self.invalid_records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_validation_time() {
        let a = ValidationResult::unsupported(FileId::from("f1"), "no match");
        let mut b = a.clone();
        b.validated_at = a.validated_at + chrono::Duration::seconds(30);
        assert_eq!(a, b);
        assert!(a.is_unsupported_format());
    }

    #[test]
    fn violation_display_includes_location() {
        let v = Violation::record(3, Some("Rating"), ViolationCode::InvalidValue, "out of range");
        assert_eq!(v.to_string(), "record 3, field Rating: out of range");
        assert!(!v.is_structural());
    }
}
