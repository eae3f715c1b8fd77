//! Deferred queue contracts.
//!
//! The producer side is [`JobQueue`]: the coordinator enqueues and forgets.
//! The consumer side is [`JobHandler`]: a worker runtime outside the request
//! cycle calls it once per delivered job. Whether and when a failed job is
//! delivered again is the runtime's business, not the handler's.

use std::sync::Arc;

use async_trait::async_trait;
use lazybox_core::RebuildJob;

use crate::BackendResult;

/// Error returned by a [`JobHandler`] for the runtime's redelivery policy.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Producer side of the deferred queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Schedules `job`. No acknowledgement beyond transport success.
    async fn enqueue(&self, job: RebuildJob) -> BackendResult<()>;

    /// Returns the name of this queue for logs and metrics labels.
    fn name(&self) -> &str {
        "queue"
    }
}

#[async_trait]
impl<T> JobQueue for Arc<T>
where
    T: JobQueue + ?Sized,
{
    async fn enqueue(&self, job: RebuildJob) -> BackendResult<()> {
        (**self).enqueue(job).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Consumer side of the deferred queue.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Executes one job.
    async fn on_job(&self, job: RebuildJob) -> Result<(), HandlerError>;
}

#[async_trait]
impl<T> JobHandler for Arc<T>
where
    T: JobHandler + ?Sized,
{
    async fn on_job(&self, job: RebuildJob) -> Result<(), HandlerError> {
        (**self).on_job(job).await
    }
}
