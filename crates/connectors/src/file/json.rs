use crate::{
    error::FormatError,
    schema::{FormatSchema, ParsedFile, RecordCheck, structural},
};
use chrono::NaiveDate;
use model::{
    core::kind::FileKind,
    execution::validation::ViolationCode,
    records::typed::PurchaseRecord,
};
use serde_json::{Map, Value};

const FIELD_ID: &str = "CustomerID";
const FIELD_AMOUNT: &str = "Amount";
const FIELD_PRODUCT: &str = "Product";
const FIELD_DATE: &str = "Date";

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Purchases: a top-level JSON array of objects.
pub struct PurchaseSchema;

impl FormatSchema for PurchaseSchema {
    type Record = PurchaseRecord;

    const KIND: FileKind = FileKind::Purchase;

    fn sniff(content: &str) -> bool {
        content.trim_start().starts_with(['[', '{'])
    }

    fn parse(content: &str) -> Result<ParsedFile<PurchaseRecord>, FormatError> {
        let value: Value = serde_json::from_str(content).map_err(|e| {
            structural(
                ViolationCode::Malformed,
                format!("invalid JSON at line {} column {}: {e}", e.line(), e.column()),
            )
        })?;

        let Value::Array(items) = value else {
            return Err(structural(
                ViolationCode::Malformed,
                "expected a top-level array of purchase objects",
            ));
        };
        if items.is_empty() {
            return Err(structural(ViolationCode::Empty, "purchase array is empty"));
        }

        let mut parsed = ParsedFile::new();
        for (idx, item) in items.iter().enumerate() {
            parsed.seen += 1;
            let mut check = RecordCheck::new(idx + 1, &mut parsed.issues);

            let Some(obj) = item.as_object() else {
                check.fail(None, ViolationCode::Malformed, "purchase entry is not an object");
                continue;
            };

            if let Some(record) = purchase(obj, &mut check) {
                parsed.records.push(record);
            }
        }

        Ok(parsed)
    }
}

fn purchase(obj: &Map<String, Value>, check: &mut RecordCheck<'_>) -> Option<PurchaseRecord> {
    let customer_id = match obj.get(FIELD_ID) {
        Some(Value::Number(n)) if n.is_u64() => Some(n.to_string()),
        Some(Value::String(s)) => check.customer_id(FIELD_ID, Some(s.as_str())),
        Some(other) => {
            check.fail(
                Some(FIELD_ID),
                ViolationCode::InvalidValue,
                format!("'{other}' is not a numeric customer id"),
            );
            None
        }
        None => {
            check.missing(FIELD_ID);
            None
        }
    };

    let amount = match obj.get(FIELD_AMOUNT) {
        None => {
            check.missing(FIELD_AMOUNT);
            None
        }
        Some(value) => match as_number(value) {
            Some(a) if a.is_finite() && a > 0.0 => Some(a),
            Some(a) => {
                check.fail(
                    Some(FIELD_AMOUNT),
                    ViolationCode::InvalidValue,
                    format!("{a} must be greater than zero"),
                );
                None
            }
            None => {
                check.fail(
                    Some(FIELD_AMOUNT),
                    ViolationCode::InvalidValue,
                    format!("'{value}' is not a number"),
                );
                None
            }
        },
    };

    let product = match obj.get(FIELD_PRODUCT) {
        Some(Value::String(s)) => check.text(FIELD_PRODUCT, Some(s.as_str())),
        Some(_) => {
            check.fail(Some(FIELD_PRODUCT), ViolationCode::InvalidValue, "product must be a string");
            None
        }
        None => {
            check.missing(FIELD_PRODUCT);
            None
        }
    };

    let date = match obj.get(FIELD_DATE).map(|v| v.as_str()) {
        None => {
            check.missing(FIELD_DATE);
            None
        }
        Some(Some(raw)) => match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
            Ok(date) => Some(date),
            Err(_) => {
                check.fail(
                    Some(FIELD_DATE),
                    ViolationCode::InvalidValue,
                    format!("'{raw}' is not a YYYY-MM-DD date"),
                );
                None
            }
        },
        Some(None) => {
            check.fail(Some(FIELD_DATE), ViolationCode::InvalidValue, "date must be a string");
            None
        }
    };

    Some(PurchaseRecord {
        customer_id: customer_id?,
        product: product?,
        amount: amount?,
        date: date?,
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_purchases_with_mixed_encodings() {
        let doc = r#"[
            {"CustomerID": "1", "Amount": 19.5, "Product": "Lamp", "Date": "2024-03-01"},
            {"CustomerID": 2, "Amount": "5", "Product": "Pen", "Date": "2024-03-02"}
        ]"#;
        let parsed = PurchaseSchema::parse(doc).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[1].customer_id, "2");
        assert_eq!(parsed.records[1].amount, 5.0);
        assert_eq!(
            parsed.records[0].date,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn reports_every_bad_field() {
        let doc = r#"[
            {"CustomerID": "A", "Amount": -3, "Product": "", "Date": "03/01/2024"},
            {"Amount": 1, "Product": "Pen", "Date": "2024-01-01"},
            "oops"
        ]"#;
        let parsed = PurchaseSchema::parse(doc).unwrap();
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.seen, 3);
        assert_eq!(parsed.rejected(), 3);
        assert_eq!(parsed.issues.iter().filter(|v| v.record == Some(1)).count(), 4);
    }

    #[test]
    fn top_level_must_be_a_non_empty_array() {
        assert!(PurchaseSchema::parse(r#"{"CustomerID": "1"}"#).is_err());
        assert!(PurchaseSchema::parse("[]").is_err());
        assert!(PurchaseSchema::parse("[{").is_err());
    }
}
