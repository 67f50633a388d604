use crate::{
    error::FormatError,
    file::{FeedbackSchema, ProfileSchema, PurchaseSchema},
    schema::FormatSchema,
};
use model::{core::kind::FileKind, records::raw::RawFile};

/// Kind declared by the arrival channel: a known channel directory anywhere
/// in the path, else the file extension.
pub fn declared_kind(location: &str) -> Option<FileKind> {
    location
        .split('/')
        .find_map(FileKind::from_channel_dir)
        .or_else(|| {
            let name = location.rsplit('/').next()?;
            let (_, ext) = name.rsplit_once('.')?;
            FileKind::from_extension(ext)
        })
}

/// Kind inferred from structural markers in the content.
pub fn sniff_kind(content: &str) -> Option<FileKind> {
    if ProfileSchema::sniff(content) {
        Some(ProfileSchema::KIND)
    } else if PurchaseSchema::sniff(content) {
        Some(PurchaseSchema::KIND)
    } else if FeedbackSchema::sniff(content) {
        Some(FeedbackSchema::KIND)
    } else {
        None
    }
}

/// Declared kind first, then content sniffing. `content` is `None` when the
/// bytes are not text, which leaves only the declared channel.
pub fn detect(file: &RawFile, content: Option<&str>) -> Result<FileKind, FormatError> {
    file.kind
        .or_else(|| declared_kind(&file.location))
        .or_else(|| content.and_then(sniff_kind))
        .ok_or_else(|| {
            FormatError::Unsupported(format!(
                "cannot classify '{}' by channel or content",
                file.location
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn channel_beats_extension() {
        assert_eq!(
            declared_kind("raw/customer_feedback/2024/export.json"),
            Some(FileKind::Feedback)
        );
        assert_eq!(declared_kind("raw/drop/orders.JSON"), Some(FileKind::Purchase));
        assert_eq!(declared_kind("raw/drop/blob"), None);
    }

    #[test]
    fn falls_back_to_content() {
        let file = RawFile::new("f1", "raw/drop/blob", Utc::now());
        assert_eq!(
            detect(&file, Some("CustomerID,Rating,Feedback\n1,5,ok")).unwrap(),
            FileKind::Feedback
        );
        assert_eq!(
            detect(&file, Some("  [{\"CustomerID\": 1}]")).unwrap(),
            FileKind::Purchase
        );
        assert!(matches!(
            detect(&file, Some("hello world")),
            Err(FormatError::Unsupported(_))
        ));
        assert!(detect(&file, None).is_err());
    }

    #[test]
    fn explicit_kind_wins() {
        let file = RawFile::new("f2", "raw/customer_details/a.xml", Utc::now())
            .with_kind(FileKind::Purchase);
        assert_eq!(detect(&file, None).unwrap(), FileKind::Purchase);
    }
}
