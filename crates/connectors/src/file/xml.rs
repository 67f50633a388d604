use crate::{
    error::FormatError,
    schema::{FormatSchema, ParsedFile, RecordCheck, structural},
};
use model::{
    core::kind::FileKind,
    execution::validation::ViolationCode,
    records::typed::CustomerRecord,
};
use quick_xml::{Reader, events::Event};
use std::collections::HashMap;

const CUSTOMER_TAG: &str = "Customer";
const FIELD_ID: &str = "CustomerID";
const FIELD_NAME: &str = "Name";
const FIELD_CITY: &str = "City";

/// Customer profiles: any root element wrapping `<Customer>` elements with
/// `<CustomerID>`, `<Name>` and `<City>` children.
pub struct ProfileSchema;

impl FormatSchema for ProfileSchema {
    type Record = CustomerRecord;

    const KIND: FileKind = FileKind::Profile;

    fn sniff(content: &str) -> bool {
        content.trim_start().starts_with('<') && content.contains("<Customer")
    }

    fn parse(content: &str) -> Result<ParsedFile<CustomerRecord>, FormatError> {
        let raw = collect_customers(content)?;
        if raw.is_empty() {
            return Err(structural(
                ViolationCode::Empty,
                "document contains no <Customer> elements",
            ));
        }

        let mut parsed = ParsedFile::new();
        for (idx, fields) in raw.iter().enumerate() {
            parsed.seen += 1;
            let mut check = RecordCheck::new(idx + 1, &mut parsed.issues);
            let id = check.customer_id(FIELD_ID, fields.get(FIELD_ID).map(String::as_str));
            let name = check.text(FIELD_NAME, fields.get(FIELD_NAME).map(String::as_str));
            let city = check.text(FIELD_CITY, fields.get(FIELD_CITY).map(String::as_str));

            if let (Some(customer_id), Some(name), Some(city)) = (id, name, city) {
                parsed.records.push(CustomerRecord {
                    customer_id,
                    name,
                    city,
                });
            }
        }

        Ok(parsed)
    }
}

type Fields = HashMap<String, String>;

/// Walks the document and returns the direct children of every top-most
/// `<Customer>` element as name/text pairs.
fn collect_customers(content: &str) -> Result<Vec<Fields>, FormatError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut customers = Vec::new();
    let mut depth = 0usize;
    let mut saw_root = false;
    // Depth of the open <Customer> element and its fields so far.
    let mut open: Option<(usize, Fields)> = None;
    let mut field: Option<(String, String)> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            structural(
                ViolationCode::Malformed,
                format!("XML error at byte {}: {e}", reader.error_position()),
            )
        })?;

        match event {
            Event::Start(e) => {
                depth += 1;
                saw_root = true;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match open.as_ref().map(|(d, _)| *d) {
                    None if name == CUSTOMER_TAG => open = Some((depth, Fields::new())),
                    Some(customer_depth) if depth == customer_depth + 1 => {
                        field = Some((name, String::new()));
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                saw_root = true;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match &mut open {
                    None if name == CUSTOMER_TAG => customers.push(Fields::new()),
                    Some((customer_depth, fields)) if depth == *customer_depth => {
                        fields.entry(name).or_default();
                    }
                    _ => {}
                }
            }
            Event::Text(t) => {
                if let Some((_, buf)) = field.as_mut() {
                    let text = t.unescape().map_err(|e| {
                        structural(ViolationCode::Malformed, format!("invalid XML text: {e}"))
                    })?;
                    buf.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some((_, buf)) = field.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                match open.as_ref().map(|(d, _)| *d) {
                    Some(customer_depth) if depth == customer_depth + 1 => {
                        if let (Some((name, text)), Some((_, fields))) = (field.take(), open.as_mut()) {
                            fields.insert(name, text);
                        }
                    }
                    Some(customer_depth) if depth == customer_depth => {
                        if let Some((_, fields)) = open.take() {
                            customers.push(fields);
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(structural(
            ViolationCode::Malformed,
            format!("unexpected end of document with {depth} unclosed element(s)"),
        ));
    }
    if !saw_root {
        return Err(structural(
            ViolationCode::Malformed,
            "document has no root element",
        ));
    }

    Ok(customers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <Customers>
            <Customer><CustomerID>1</CustomerID><Name>Ada</Name><City>London</City></Customer>
            <Customer>
                <CustomerID>2</CustomerID>
                <Name>Grace &amp; Co</Name>
                <City><![CDATA[New York]]></City>
            </Customer>
        </Customers>"#;

    #[test]
    fn parses_customers() {
        let parsed = ProfileSchema::parse(PROFILES).unwrap();
        assert_eq!(parsed.seen, 2);
        assert!(parsed.issues.is_empty());
        assert_eq!(parsed.records[1].name, "Grace & Co");
        assert_eq!(parsed.records[1].city, "New York");
    }

    #[test]
    fn collects_all_record_violations() {
        let doc = r#"<Customers>
            <Customer><CustomerID>x1</CustomerID><Name/><City>Paris</City></Customer>
            <Customer><CustomerID>3</CustomerID><Name>Bo</Name></Customer>
            <Customer><CustomerID>4</CustomerID><Name>Cy</Name><City>Rome</City></Customer>
        </Customers>"#;
        let parsed = ProfileSchema::parse(doc).unwrap();

        assert_eq!(parsed.seen, 3);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.rejected(), 2);
        // bad id + empty name on record 1, missing city on record 2
        assert_eq!(parsed.issues.len(), 3);
        assert_eq!(parsed.issues[2].record, Some(2));
        assert_eq!(parsed.issues[2].code, ViolationCode::MissingField);
    }

    #[test]
    fn rejects_broken_documents() {
        let err = ProfileSchema::parse("<Customers><Customer><CustomerID>1</CustomerID>").unwrap_err();
        assert!(matches!(err, FormatError::Structure(_)));

        let err = ProfileSchema::parse("<Customers></Customers>").unwrap_err();
        let violations = err.violations();
        assert_eq!(violations[0].code, ViolationCode::Empty);

        assert!(ProfileSchema::parse("   ").is_err());
    }

    #[test]
    fn sniffs_profile_documents() {
        assert!(ProfileSchema::sniff(PROFILES));
        assert!(!ProfileSchema::sniff("[{\"CustomerID\": 1}]"));
    }
}
