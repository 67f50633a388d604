use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    files_seen: AtomicU64,
    files_validated: AtomicU64,
    files_quarantined: AtomicU64,
    validation_failures: AtomicU64,
    relocation_retries: AtomicU64,
    relocation_failures: AtomicU64,
    batches_processed: AtomicU64,
    batches_aborted: AtomicU64,
    records_processed: AtomicU64,
    record_errors: AtomicU64,
    entities_written: AtomicU64,
}

/// Process-wide pipeline counters. Cloning shares the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub files_seen: u64,
    pub files_validated: u64,
    pub files_quarantined: u64,
    pub validation_failures: u64,
    pub relocation_retries: u64,
    pub relocation_failures: u64,
    pub batches_processed: u64,
    pub batches_aborted: u64,
    pub records_processed: u64,
    pub record_errors: u64,
    pub entities_written: u64,
}

macro_rules! counter {
    ($($fn_name:ident => $field:ident),* $(,)?) => {
        $(
            pub fn $fn_name(&self, count: u64) {
                self.inner.$field.fetch_add(count, Ordering::Relaxed);
            }
        )*
    };
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    counter! {
        increment_files_seen => files_seen,
        increment_files_validated => files_validated,
        increment_files_quarantined => files_quarantined,
        increment_validation_failures => validation_failures,
        increment_relocation_retries => relocation_retries,
        increment_relocation_failures => relocation_failures,
        increment_batches => batches_processed,
        increment_batches_aborted => batches_aborted,
        increment_records => records_processed,
        increment_record_errors => record_errors,
        increment_entities => entities_written,
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let m = &self.inner;
        MetricsSnapshot {
            files_seen: load(&m.files_seen),
            files_validated: load(&m.files_validated),
            files_quarantined: load(&m.files_quarantined),
            validation_failures: load(&m.validation_failures),
            relocation_retries: load(&m.relocation_retries),
            relocation_failures: load(&m.relocation_failures),
            batches_processed: load(&m.batches_processed),
            batches_aborted: load(&m.batches_aborted),
            records_processed: load(&m.records_processed),
            record_errors: load(&m.record_errors),
            entities_written: load(&m.entities_written),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let metrics = Metrics::new();
        let other = metrics.clone();
        metrics.increment_files_quarantined(1);
        other.increment_files_quarantined(2);
        other.increment_entities(5);

        let snap = metrics.snapshot();
        assert_eq!(snap.files_quarantined, 3);
        assert_eq!(snap.entities_written, 5);
        assert_eq!(snap.batches_processed, 0);
    }
}
