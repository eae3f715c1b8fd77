//! In-memory backend metrics.
//!
//! Enable the `metrics` feature to use these metrics.
//!
//! ## Metrics
//!
//! - `lazybox_memory_entries` - Current number of entries in a [`MokaStore`](crate::MokaStore) (gauge)
//! - `lazybox_memory_queue_jobs` - Jobs handled by a [`QueueRuntime`](crate::QueueRuntime), by result (counter)
//!
//! The entry gauge carries a `store` label to distinguish between instances.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Metric name for the store entry count gauge.
    pub static ref MEMORY_ENTRIES: &'static str = {
        metrics::describe_gauge!(
            "lazybox_memory_entries",
            "Current number of entries in the in-memory store."
        );
        "lazybox_memory_entries"
    };

    /// Metric name for the queue job counter.
    pub static ref MEMORY_QUEUE_JOBS: &'static str = {
        metrics::describe_counter!(
            "lazybox_memory_queue_jobs",
            "Jobs handled by the in-memory queue runtime."
        );
        "lazybox_memory_queue_jobs"
    };
}

/// Record the current entry count of a store.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_entries(store: &str, entries: u64) {
    metrics::gauge!(*MEMORY_ENTRIES, "store" => store.to_string()).set(entries as f64);
}

/// Record the current entry count of a store (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_entries(_store: &str, _entries: u64) {}

/// Record one handled job. `result` is `completed`, `redelivered` or `dropped`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_job(result: &'static str) {
    metrics::counter!(*MEMORY_QUEUE_JOBS, "result" => result).increment(1);
}

/// Record one handled job (no-op when `metrics` feature disabled).
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_job(_result: &'static str) {}
