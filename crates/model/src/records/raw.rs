use crate::core::{identifiers::FileId, kind::FileKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Handle to an artifact that landed in the raw area. Never mutated after
/// creation; the router relocates the underlying object, not this handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFile {
    pub id: FileId,
    /// Kind declared by the arrival channel, if the producer declared one.
    pub kind: Option<FileKind>,
    /// Object key inside the store, e.g. `raw/customer_details/2024/file.xml`.
    pub location: String,
    pub arrived_at: DateTime<Utc>,
}

impl RawFile {
    pub fn new(id: impl Into<FileId>, location: impl Into<String>, arrived_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            location: location.into(),
            arrived_at,
        }
    }

    pub fn with_kind(mut self, kind: FileKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Last path segment of the location.
    pub fn file_name(&self) -> &str {
        self.location.rsplit('/').next().unwrap_or(&self.location)
    }
}
