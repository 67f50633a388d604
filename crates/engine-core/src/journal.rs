use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use model::core::{identifiers::FileId, kind::FileKind};
use serde::{Deserialize, Serialize};

const JOURNAL_TREE: &str = "relocations";
const DESTINATION_TREE: &str = "relocations_by_destination";

/// Completed relocation of one arrival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationEntry {
    pub file_id: FileId,
    /// blake3 of file id and destination.
    pub key: String,
    pub source: String,
    pub destination: String,
    pub valid: bool,
    pub kind: Option<FileKind>,
    pub record_count: usize,
    pub relocated_at: DateTime<Utc>,
}

pub fn relocation_key(file_id: &FileId, destination: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(file_id.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(destination.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Durable record of relocated files, keyed by file id. Redelivered arrival
/// events consult it before touching storage; replays look files up by the
/// location they were moved to.
#[derive(Debug, Clone)]
pub struct RelocationJournal {
    tree: sled::Tree,
    by_destination: sled::Tree,
}

impl RelocationJournal {
    pub fn open(db: &sled::Db) -> Result<Self, LedgerError> {
        Ok(Self {
            tree: db.open_tree(JOURNAL_TREE)?,
            by_destination: db.open_tree(DESTINATION_TREE)?,
        })
    }

    pub fn get(&self, file_id: &FileId) -> Result<Option<RelocationEntry>, LedgerError> {
        match self.tree.get(file_id.as_str())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Entry of the file that was relocated to `destination`.
    pub fn find_by_destination(
        &self,
        destination: &str,
    ) -> Result<Option<RelocationEntry>, LedgerError> {
        match self.by_destination.get(destination)? {
            Some(file_id) => {
                let file_id = FileId::from(String::from_utf8_lossy(&file_id).into_owned());
                self.get(&file_id)
            }
            None => Ok(None),
        }
    }

    /// Stores the entry unless the file already has one. Returns the entry
    /// that is in the journal afterwards.
    pub async fn record(&self, entry: RelocationEntry) -> Result<RelocationEntry, LedgerError> {
        let bytes = bincode::serialize(&entry)?;
        let swapped = self
            .tree
            .compare_and_swap(entry.file_id.as_str(), None as Option<&[u8]>, Some(bytes))?;

        let stored = match swapped {
            Ok(()) => {
                self.by_destination
                    .insert(entry.destination.as_str(), entry.file_id.as_str())?;
                entry
            }
            Err(conflict) => match conflict.current {
                Some(current) => bincode::deserialize(&current)?,
                None => entry,
            },
        };

        self.tree.flush_async().await?;
        self.by_destination.flush_async().await?;
        Ok(stored)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(id: &str, destination: &str) -> RelocationEntry {
        let file_id = FileId::from(id);
        RelocationEntry {
            key: relocation_key(&file_id, destination),
            file_id,
            source: "raw/customer_details/a.xml".into(),
            destination: destination.into(),
            valid: true,
            kind: Some(FileKind::Profile),
            record_count: 3,
            relocated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn first_relocation_wins() {
        let dir = tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let journal = RelocationJournal::open(&db).unwrap();

        let first = journal
            .record(entry("f1", "validated/customer_details/a.xml"))
            .await
            .unwrap();
        let second = journal
            .record(entry("f1", "error/customer_details/a.xml"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(journal.len(), 1);
        assert_eq!(
            journal.get(&FileId::from("f1")).unwrap().unwrap().destination,
            "validated/customer_details/a.xml"
        );
    }

    #[tokio::test]
    async fn entries_are_found_by_destination() {
        let dir = tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let journal = RelocationJournal::open(&db).unwrap();

        journal
            .record(entry("f1", "validated/customer_details/a.xml"))
            .await
            .unwrap();
        journal
            .record(entry("f1", "error/customer_details/a.xml"))
            .await
            .unwrap();

        let found = journal
            .find_by_destination("validated/customer_details/a.xml")
            .unwrap()
            .unwrap();
        assert_eq!(found.file_id, FileId::from("f1"));
        assert_eq!(found.record_count, 3);
        assert!(
            journal
                .find_by_destination("error/customer_details/a.xml")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn keys_depend_on_destination() {
        let id = FileId::from("f1");
        assert_eq!(relocation_key(&id, "a"), relocation_key(&id, "a"));
        assert_ne!(relocation_key(&id, "a"), relocation_key(&id, "b"));
    }
}
