use crate::error::FormatError;
use model::{
    core::kind::FileKind,
    execution::validation::{Violation, ViolationCode},
};
use std::collections::BTreeSet;

/// Records that survived per-record checks, plus the violations of those
/// that did not.
#[derive(Debug, Clone)]
pub struct ParsedFile<T> {
    pub records: Vec<T>,
    pub issues: Vec<Violation>,
    /// Records encountered, valid or not.
    pub seen: usize,
}

impl<T> ParsedFile<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            issues: Vec::new(),
            seen: 0,
        }
    }

    /// Number of distinct records with at least one violation.
    pub fn rejected(&self) -> usize {
        self.issues
            .iter()
            .filter_map(|v| v.record)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

impl<T> Default for ParsedFile<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The `{detect, validate}` capability every supported format implements.
pub trait FormatSchema {
    type Record: Send + 'static;

    const KIND: FileKind;

    /// Cheap check for the structural markers of this format.
    fn sniff(content: &str) -> bool;

    /// Parses the whole document. File-level problems are returned as
    /// [`FormatError::Structure`]; record-level problems are collected in
    /// [`ParsedFile::issues`] without stopping the parse.
    fn parse(content: &str) -> Result<ParsedFile<Self::Record>, FormatError>;
}

const UTF8_BOM: &str = "\u{feff}";

pub fn decode(content: &[u8]) -> Result<&str, FormatError> {
    let text = std::str::from_utf8(content)?;
    Ok(text.strip_prefix(UTF8_BOM).unwrap_or(text))
}

pub fn parse_bytes<S: FormatSchema>(content: &[u8]) -> Result<ParsedFile<S::Record>, FormatError> {
    S::parse(decode(content)?)
}

pub(crate) fn structural(code: ViolationCode, message: impl Into<String>) -> FormatError {
    FormatError::Structure(vec![Violation::file(code, message)])
}

/// Accumulates the violations of one record. Every check runs regardless of
/// earlier failures so the error list is complete.
pub(crate) struct RecordCheck<'a> {
    record: usize,
    issues: &'a mut Vec<Violation>,
}

impl<'a> RecordCheck<'a> {
    pub(crate) fn new(record: usize, issues: &'a mut Vec<Violation>) -> Self {
        Self { record, issues }
    }

    pub(crate) fn fail(&mut self, field: Option<&str>, code: ViolationCode, message: impl Into<String>) {
        self.issues
            .push(Violation::record(self.record, field, code, message));
    }

    pub(crate) fn missing(&mut self, field: &str) {
        self.fail(Some(field), ViolationCode::MissingField, "required field is missing");
    }

    /// Trimmed, non-empty text.
    pub(crate) fn text(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim) {
            None => {
                self.missing(field);
                None
            }
            Some("") => {
                self.fail(Some(field), ViolationCode::InvalidValue, "must not be empty");
                None
            }
            Some(v) => Some(v.to_string()),
        }
    }

    /// Customer ids are non-empty strings of ASCII digits.
    pub(crate) fn customer_id(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        let id = self.text(field, value)?;
        if id.chars().all(|c| c.is_ascii_digit()) {
            Some(id)
        } else {
            self.fail(
                Some(field),
                ViolationCode::InvalidValue,
                format!("'{id}' is not a numeric customer id"),
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_strips_bom_and_rejects_invalid_utf8() {
        assert_eq!(decode(b"\xef\xbb\xbfa,b").unwrap(), "a,b");
        assert!(matches!(decode(b"\xff\xfe"), Err(FormatError::Encoding(_))));
    }

    #[test]
    fn record_check_accumulates_every_violation() {
        let mut issues = Vec::new();
        let mut check = RecordCheck::new(4, &mut issues);
        assert_eq!(check.customer_id("CustomerID", Some("12a")), None);
        assert_eq!(check.text("Name", Some("  ")), None);
        assert_eq!(check.text("City", None), None);
        assert_eq!(check.text("Product", Some(" Lamp ")), Some("Lamp".into()));

        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|v| v.record == Some(4)));
        assert_eq!(issues[2].code, ViolationCode::MissingField);
    }
}
