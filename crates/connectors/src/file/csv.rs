use crate::{
    error::FormatError,
    schema::{FormatSchema, ParsedFile, RecordCheck, structural},
};
use csv::{ReaderBuilder, StringRecord, Trim};
use model::{
    core::kind::FileKind,
    execution::validation::{Violation, ViolationCode},
    records::typed::FeedbackRecord,
};

const FIELD_ID: &str = "CustomerID";
const FIELD_RATING: &str = "Rating";
const FIELD_FEEDBACK: &str = "Feedback";
const REQUIRED_COLUMNS: [&str; 3] = [FIELD_ID, FIELD_RATING, FIELD_FEEDBACK];

const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

/// Feedback: CSV with a header row naming at least `CustomerID`, `Rating`
/// and `Feedback`.
pub struct FeedbackSchema;

impl FormatSchema for FeedbackSchema {
    type Record = FeedbackRecord;

    const KIND: FileKind = FileKind::Feedback;

    fn sniff(content: &str) -> bool {
        let header = content.trim_start().lines().next().unwrap_or_default();
        header.contains(',') && header.to_ascii_lowercase().contains("customerid")
    }

    fn parse(content: &str) -> Result<ParsedFile<FeedbackRecord>, FormatError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(content.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| structural(ViolationCode::Malformed, format!("unreadable CSV header: {e}")))?
            .clone();
        let columns = Columns::resolve(&headers)?;

        let mut parsed = ParsedFile::new();
        for (idx, row) in reader.records().enumerate() {
            parsed.seen += 1;
            let mut check = RecordCheck::new(idx + 1, &mut parsed.issues);

            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    check.fail(None, ViolationCode::Malformed, format!("unreadable row: {e}"));
                    continue;
                }
            };

            let customer_id = check.customer_id(FIELD_ID, row.get(columns.id));
            let rating = rating(row.get(columns.rating), &mut check);
            let text = check.text(FIELD_FEEDBACK, row.get(columns.feedback));

            if let (Some(customer_id), Some(rating), Some(text)) = (customer_id, rating, text) {
                parsed.records.push(FeedbackRecord {
                    customer_id,
                    rating,
                    text,
                });
            }
        }

        if parsed.seen == 0 {
            return Err(structural(ViolationCode::Empty, "CSV has a header but no rows"));
        }

        Ok(parsed)
    }
}

struct Columns {
    id: usize,
    rating: usize,
    feedback: usize,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self, FormatError> {
        let position = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

        let missing: Vec<Violation> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| position(**name).is_none())
            .map(|name| Violation {
                code: ViolationCode::MissingField,
                record: None,
                field: Some(name.to_string()),
                message: "required column is missing from the header".into(),
            })
            .collect();

        match (position(FIELD_ID), position(FIELD_RATING), position(FIELD_FEEDBACK)) {
            (Some(id), Some(rating), Some(feedback)) => Ok(Self {
                id,
                rating,
                feedback,
            }),
            _ => Err(FormatError::Structure(missing)),
        }
    }
}

fn rating(value: Option<&str>, check: &mut RecordCheck<'_>) -> Option<u8> {
    let raw = check.text(FIELD_RATING, value)?;
    match raw.parse::<i64>() {
        Ok(r) if RATING_RANGE.contains(&r) => u8::try_from(r).ok(),
        Ok(r) => {
            check.fail(
                Some(FIELD_RATING),
                ViolationCode::InvalidValue,
                format!("{r} is outside 1..=5"),
            );
            None
        }
        Err(_) => {
            check.fail(
                Some(FIELD_RATING),
                ViolationCode::InvalidValue,
                format!("'{raw}' is not an integer rating"),
            );
            None
        }
    }
}
