use chrono::{DateTime, Utc};
use engine_config::settings::validated::BatchMode;
use model::{
    core::identifiers::BatchId,
    execution::batch::{CleanFileRef, TransformTrigger},
};
use std::{collections::BTreeMap, time::Instant};
use tracing::debug;

/// Deterministic batch id: the same partition and file set always map to the
/// same id, so a redelivered trigger is recognised by the ledger.
pub fn batch_id_for(partition: &str, files: &[CleanFileRef]) -> BatchId {
    let mut ids: Vec<&str> = files.iter().map(|f| f.file_id.as_str()).collect();
    ids.sort_unstable();

    let mut h = blake3::Hasher::new();
    h.update(partition.as_bytes());
    for id in ids {
        h.update(b":");
        h.update(id.as_bytes());
    }
    BatchId::from(format!("bat-{}", &h.finalize().to_hex()[..24]))
}

struct OpenWindow {
    opened: Instant,
    window_start: DateTime<Utc>,
    files: Vec<CleanFileRef>,
}

/// Groups clean files into transform triggers, one open window per
/// partition.
pub struct BatchAccumulator {
    mode: BatchMode,
    open: BTreeMap<String, OpenWindow>,
}

impl BatchAccumulator {
    pub fn new(mode: BatchMode) -> Self {
        Self {
            mode,
            open: BTreeMap::new(),
        }
    }

    pub fn pending_files(&self) -> usize {
        self.open.values().map(|w| w.files.len()).sum()
    }

    /// Adds a file; returns a trigger when this file closes its window.
    pub fn push(&mut self, partition: String, file: CleanFileRef, now: Instant) -> Option<TransformTrigger> {
        let max_files = match self.mode {
            BatchMode::PerFile => 1,
            BatchMode::Windowed { max_files, .. } => max_files,
        };

        let window = self.open.entry(partition.clone()).or_insert_with(|| OpenWindow {
            opened: now,
            window_start: Utc::now(),
            files: Vec::new(),
        });
        window.files.push(file);

        if window.files.len() >= max_files {
            let window = self.open.remove(&partition)?;
            Some(Self::close(partition, window))
        } else {
            None
        }
    }

    /// Closes every window older than the configured window length.
    pub fn due(&mut self, now: Instant) -> Vec<TransformTrigger> {
        let BatchMode::Windowed { window, .. } = self.mode else {
            return Vec::new();
        };

        let expired: Vec<String> = self
            .open
            .iter()
            .filter(|(_, w)| now.saturating_duration_since(w.opened) >= window)
            .map(|(p, _)| p.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|p| self.open.remove(&p).map(|w| Self::close(p, w)))
            .collect()
    }

    /// Earliest instant at which `due` will close a window.
    pub fn next_deadline(&self) -> Option<Instant> {
        let BatchMode::Windowed { window, .. } = self.mode else {
            return None;
        };
        self.open.values().map(|w| w.opened + window).min()
    }

    pub fn flush(&mut self) -> Vec<TransformTrigger> {
        std::mem::take(&mut self.open)
            .into_iter()
            .map(|(p, w)| Self::close(p, w))
            .collect()
    }

    fn close(partition: String, window: OpenWindow) -> TransformTrigger {
        let trigger = TransformTrigger {
            batch_id: batch_id_for(&partition, &window.files),
            partition,
            window_start: window.window_start,
            window_end: Utc::now(),
            files: window.files,
        };
        debug!(
            batch_id = %trigger.batch_id,
            partition = %trigger.partition,
            files = trigger.files.len(),
            "Closed batch window"
        );
        trigger
    }
}
