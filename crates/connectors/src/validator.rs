use crate::{
    detect::detect,
    file::{FeedbackSchema, ProfileSchema, PurchaseSchema},
    schema::{FormatSchema, decode},
};
use chrono::Utc;
use model::{
    core::kind::FileKind,
    execution::validation::{ValidationResult, Violation, ViolationCode},
    records::raw::RawFile,
};
use tracing::debug;

/// How many invalid records a file may carry and still be routed to the
/// clean area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationPolicy {
    /// Share of invalid records, in `[0, 1]`, above which the whole file is
    /// rejected. `0.0` rejects any file with a bad record.
    pub max_invalid_record_ratio: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            max_invalid_record_ratio: 0.5,
        }
    }
}

impl ValidationPolicy {
    pub fn strict() -> Self {
        Self {
            max_invalid_record_ratio: 0.0,
        }
    }
}

/// Format detector and schema validator. Pure: the verdict depends only on
/// the file handle and its content.
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    policy: ValidationPolicy,
}

struct Inspection {
    records: usize,
    invalid: usize,
    structural: Vec<Violation>,
    issues: Vec<Violation>,
}

impl SchemaValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    pub fn validate(&self, file: &RawFile, content: &[u8]) -> ValidationResult {
        let text = decode(content).ok();

        let kind = match detect(file, text) {
            Ok(kind) => kind,
            Err(err) => {
                debug!(file_id = %file.id, location = %file.location, "Unsupported format");
                return ValidationResult::unsupported(file.id.clone(), err.to_string());
            }
        };

        let inspection = match text {
            Some(text) => inspect_kind(kind, text),
            None => Inspection {
                records: 0,
                invalid: 0,
                structural: vec![Violation::file(
                    ViolationCode::Malformed,
                    "content is not valid UTF-8 text",
                )],
                issues: Vec::new(),
            },
        };

        self.verdict(file, kind, inspection)
    }

    fn verdict(&self, file: &RawFile, kind: FileKind, inspection: Inspection) -> ValidationResult {
        let Inspection {
            records,
            invalid,
            structural,
            issues,
        } = inspection;

        let ratio = if records == 0 {
            0.0
        } else {
            invalid as f64 / records as f64
        };

        let (errors, record_issues) = if !structural.is_empty() {
            (structural, issues)
        } else if invalid > 0 && ratio > self.policy.max_invalid_record_ratio {
            let mut errors = vec![Violation::file(
                ViolationCode::RejectedRecords,
                format!(
                    "{invalid} of {records} records are invalid (limit {:.0}%)",
                    self.policy.max_invalid_record_ratio * 100.0
                ),
            )];
            errors.extend(issues);
            (errors, Vec::new())
        } else {
            (Vec::new(), issues)
        };

        debug!(
            file_id = %file.id,
            kind = %kind,
            records,
            invalid,
            errors = errors.len(),
            "Validated file"
        );

        ValidationResult {
            file_id: file.id.clone(),
            kind: Some(kind),
            is_valid: errors.is_empty(),
            errors,
            record_issues,
            record_count: records,
            invalid_records: invalid,
            validated_at: Utc::now(),
        }
    }
}

fn inspect_kind(kind: FileKind, text: &str) -> Inspection {
    match kind {
        FileKind::Profile => inspect::<ProfileSchema>(text),
        FileKind::Purchase => inspect::<PurchaseSchema>(text),
        FileKind::Feedback => inspect::<FeedbackSchema>(text),
    }
}

fn inspect<S: FormatSchema>(text: &str) -> Inspection {
    match S::parse(text) {
        Ok(parsed) => Inspection {
            records: parsed.seen,
            invalid: parsed.rejected(),
            structural: Vec::new(),
            issues: parsed.issues,
        },
        Err(err) => Inspection {
            records: 0,
            invalid: 0,
            structural: err.violations(),
            issues: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(location: &str) -> RawFile {
        RawFile::new("file-1", location, Utc::now())
    }

    fn profiles(good: usize, bad: usize) -> String {
        let mut doc = String::from("<Customers>");
        for i in 0..good {
            doc.push_str(&format!(
                "<Customer><CustomerID>{i}</CustomerID><Name>N{i}</Name><City>C</City></Customer>"
            ));
        }
        for _ in 0..bad {
            doc.push_str("<Customer><CustomerID>bad</CustomerID><Name>X</Name></Customer>");
        }
        doc.push_str("</Customers>");
        doc
    }

    #[test]
    fn valid_file_has_no_errors() {
        let validator = SchemaValidator::default();
        let result = validator.validate(&raw("raw/customer_details/p.xml"), profiles(3, 0).as_bytes());
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.kind, Some(FileKind::Profile));
        assert_eq!(result.record_count, 3);
    }

    #[test]
    fn tolerates_a_minority_of_bad_records() {
        let validator = SchemaValidator::default();
        let result = validator.validate(&raw("raw/customer_details/p.xml"), profiles(9, 1).as_bytes());
        assert!(result.is_valid);
        assert_eq!(result.invalid_records, 1);
        assert_eq!(result.valid_records(), 9);
        // bad id and missing city, both reported
        assert_eq!(result.record_issues.len(), 2);
    }

    #[test]
    fn strict_policy_rejects_any_bad_record() {
        let validator = SchemaValidator::new(ValidationPolicy::strict());
        let result = validator.validate(&raw("raw/customer_details/p.xml"), profiles(9, 1).as_bytes());
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].code, ViolationCode::RejectedRecords);
        assert_eq!(result.errors.len(), 3);
        assert!(result.record_issues.is_empty());
    }

    #[test]
    fn broken_feedback_is_a_schema_violation() {
        let validator = SchemaValidator::default();
        let result = validator.validate(
            &raw("raw/customer_feedback/f.csv"),
            b"\"unterminated,{{garbage\n",
        );
        assert!(!result.is_valid);
        assert!(!result.is_unsupported_format());
        assert!(result.errors.iter().all(|v| v.is_structural()));
    }

    #[test]
    fn unknown_content_is_unsupported() {
        let validator = SchemaValidator::default();
        let result = validator.validate(&raw("raw/drop/blob.bin"), b"\x00\x01\x02");
        assert!(!result.is_valid);
        assert!(result.is_unsupported_format());
        assert_eq!(result.kind, None);
    }

    #[test]
    fn validation_is_deterministic() {
        let validator = SchemaValidator::default();
        let file = raw("raw/customer_purchases/p.json");
        let content = br#"[{"CustomerID":"1","Amount":0,"Product":"","Date":"x"}]"#;
        assert_eq!(validator.validate(&file, content), validator.validate(&file, content));
    }
}
