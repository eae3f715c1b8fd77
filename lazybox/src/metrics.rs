//! Metrics declaration and initialization.
//!
//! Everything here compiles to a no-op unless the `metrics` feature is on.

use std::time::Duration;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track coordinator calls by outcome status and policy.
    pub static ref OUTCOME_COUNTER: &'static str = {
        metrics::describe_counter!(
            "lazybox_outcome_total",
            "Total number of coordinator calls per outcome status."
        );
        "lazybox_outcome_total"
    };
    /// Histogram of coordinator call duration.
    pub static ref BUILD_DURATION: &'static str = {
        metrics::describe_histogram!(
            "lazybox_build_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of coordinator calls in seconds."
        );
        "lazybox_build_duration_seconds"
    };
    /// Track waits on a rebuild lock held by someone else.
    pub static ref LOCK_WAIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "lazybox_lock_wait_total",
            "Total number of waits on a contended rebuild lock."
        );
        "lazybox_lock_wait_total"
    };
    /// Track rebuild jobs handed to the queue.
    pub static ref ENQUEUED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "lazybox_rebuild_enqueued_total",
            "Total number of rebuild jobs enqueued."
        );
        "lazybox_rebuild_enqueued_total"
    };
    /// Track deferred rebuilds by result.
    pub static ref WORKER_JOB_COUNTER: &'static str = {
        metrics::describe_counter!(
            "lazybox_worker_jobs_total",
            "Total number of deferred rebuilds per result."
        );
        "lazybox_worker_jobs_total"
    };
    /// Histogram of deferred rebuild duration.
    pub static ref REBUILD_DURATION: &'static str = {
        metrics::describe_histogram!(
            "lazybox_rebuild_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of deferred rebuilds in seconds."
        );
        "lazybox_rebuild_duration_seconds"
    };
}

/// Record one finished coordinator call.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_outcome(status: &'static str, policy: &'static str, duration: Duration) {
    metrics::counter!(*OUTCOME_COUNTER, "status" => status, "policy" => policy).increment(1);
    metrics::histogram!(*BUILD_DURATION, "status" => status, "policy" => policy)
        .record(duration.as_secs_f64());
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_outcome(_status: &'static str, _policy: &'static str, _duration: Duration) {}

/// Record a wait on a contended lock.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_lock_wait(scope: &str) {
    metrics::counter!(*LOCK_WAIT_COUNTER, "scope" => scope.to_string()).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_lock_wait(_scope: &str) {}

/// Record a job handed to the queue.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_enqueued(scope: &str) {
    metrics::counter!(*ENQUEUED_COUNTER, "scope" => scope.to_string()).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_enqueued(_scope: &str) {}

/// Record one deferred rebuild. `result` is `completed` or `failed`.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_rebuild(result: &'static str, duration: Duration) {
    metrics::counter!(*WORKER_JOB_COUNTER, "result" => result).increment(1);
    metrics::histogram!(*REBUILD_DURATION, "result" => result).record(duration.as_secs_f64());
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_rebuild(_result: &'static str, _duration: Duration) {}
