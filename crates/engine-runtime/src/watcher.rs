use connectors::storage::{ObjectMeta, ObjectStore, StorageError};
use model::{core::identifiers::FileId, records::raw::RawFile};
use std::{collections::HashSet, sync::Arc};
use tracing::debug;

/// Identity of one arrival: the same key rewritten later is a new arrival.
pub fn arrival_id(meta: &ObjectMeta) -> FileId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(meta.key.as_bytes());
    hasher.update(&[0]);
    hasher.update(&meta.size.to_be_bytes());
    hasher.update(&meta.modified.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    let hex = hasher.finalize().to_hex();
    FileId::new(format!("arr-{}", &hex[..32]))
}

/// Turns polling of the landing area into a stream of arrival events.
pub struct ArrivalWatcher {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    seen: HashSet<FileId>,
}

impl ArrivalWatcher {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            seen: HashSet::new(),
        }
    }

    /// Arrivals not reported by an earlier poll, oldest first.
    pub async fn poll(&mut self) -> Result<Vec<RawFile>, StorageError> {
        let mut objects = self.store.list(&self.prefix).await?;
        objects.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.key.cmp(&b.key)));

        let present: Vec<(FileId, ObjectMeta)> =
            objects.into_iter().map(|meta| (arrival_id(&meta), meta)).collect();
        // Objects that left the landing area can't come back under the same id.
        let ids: HashSet<&FileId> = present.iter().map(|(id, _)| id).collect();
        self.seen.retain(|id| ids.contains(id));

        let mut arrivals = Vec::new();
        for (id, meta) in present {
            if self.seen.insert(id.clone()) {
                arrivals.push(RawFile::new(id, meta.key, meta.modified));
            }
        }
        if !arrivals.is_empty() {
            debug!(prefix = %self.prefix, arrivals = arrivals.len(), "New arrivals");
        }
        Ok(arrivals)
    }

    /// Makes the arrival eligible for redelivery on the next poll.
    pub fn forget(&mut self, id: &FileId) {
        self.seen.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::storage::InMemoryObjectStore;
    use tracing_test::traced_test;

    #[traced_test]
    #[tokio::test]
    async fn reports_each_arrival_once() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.put("raw/customer_feedback/a.csv", b"x").await.unwrap();
        let mut watcher = ArrivalWatcher::new(store.clone(), "raw/");

        let first = watcher.poll().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].location, "raw/customer_feedback/a.csv");
        assert!(watcher.poll().await.unwrap().is_empty());

        store.put("raw/customer_feedback/b.csv", b"y").await.unwrap();
        let second = watcher.poll().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].location, "raw/customer_feedback/b.csv");
        assert!(logs_contain("New arrivals"));
    }

    #[tokio::test]
    async fn forgotten_arrivals_are_redelivered() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.put("raw/customer_details/p.xml", b"<Customers/>").await.unwrap();
        let mut watcher = ArrivalWatcher::new(store, "raw/");

        let first = watcher.poll().await.unwrap();
        watcher.forget(&first[0].id);
        let again = watcher.poll().await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].id, first[0].id);
    }

    #[test]
    fn rewritten_objects_get_a_new_id() {
        let meta = ObjectMeta {
            key: "raw/a.csv".into(),
            size: 10,
            modified: chrono::Utc::now(),
        };
        let rewritten = ObjectMeta {
            size: 11,
            ..meta.clone()
        };
        assert_eq!(arrival_id(&meta), arrival_id(&meta));
        assert_ne!(arrival_id(&meta), arrival_id(&rewritten));
    }
}
