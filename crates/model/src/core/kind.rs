use serde::{Deserialize, Serialize};
use std::fmt;

/// The three record families the pipeline accepts, one per file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileKind {
    /// Customer profiles, delivered as XML.
    Profile,
    /// Purchases, delivered as a JSON array.
    Purchase,
    /// Feedback, delivered as CSV.
    Feedback,
}

impl FileKind {
    pub const ALL: [FileKind; 3] = [FileKind::Profile, FileKind::Purchase, FileKind::Feedback];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Profile => "PROFILE",
            FileKind::Purchase => "PURCHASE",
            FileKind::Feedback => "FEEDBACK",
        }
    }

    /// Directory that declares this kind inside the raw, clean and quarantine areas.
    pub fn channel_dir(&self) -> &'static str {
        match self {
            FileKind::Profile => "customer_details",
            FileKind::Purchase => "customer_purchases",
            FileKind::Feedback => "customer_feedback",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Profile => "xml",
            FileKind::Purchase => "json",
            FileKind::Feedback => "csv",
        }
    }

    pub fn from_channel_dir(dir: &str) -> Option<Self> {
        FileKind::ALL.into_iter().find(|k| k.channel_dir() == dir)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        FileKind::ALL
            .into_iter()
            .find(|k| k.extension().eq_ignore_ascii_case(ext))
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_and_extension_lookups() {
        assert_eq!(
            FileKind::from_channel_dir("customer_purchases"),
            Some(FileKind::Purchase)
        );
        assert_eq!(FileKind::from_channel_dir("customers"), None);
        assert_eq!(FileKind::from_extension("CSV"), Some(FileKind::Feedback));
        assert_eq!(FileKind::from_extension("parquet"), None);
    }
}
