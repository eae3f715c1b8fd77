use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use lazybox_backend::{CacheStore, HandlerError, JobHandler};
use lazybox_core::{CacheEntry, ContextProvider, RebuildJob};
use tracing::{Instrument, debug, error, info_span};

use crate::error::CoordinatorError;
use crate::masquerade::Masquerade;
use crate::metrics::record_rebuild;
use crate::registry::BuilderRegistry;

/// Queue consumer redoing deferred builds.
///
/// Each job is built under a [`Masquerade`] of the context recorded when it
/// was enqueued, then stored under the job's fingerprint for the job's ttl.
/// Locks are never touched: the enqueuing request released its own already.
///
/// A worker masquerades on one provider, so a runtime must hand it one job
/// at a time. Failures are returned to the runtime, which owns redelivery.
///
/// Usually obtained from [`Coordinator::worker`](crate::Coordinator::worker).
pub struct RebuildWorker {
    store: Arc<dyn CacheStore>,
    registry: Arc<BuilderRegistry>,
    masquerade: Masquerade,
    build_timeout: Option<Duration>,
}

impl std::fmt::Debug for RebuildWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildWorker")
            .field("store", &self.store.name())
            .field("registry", &self.registry)
            .field("masquerade", &self.masquerade)
            .field("build_timeout", &self.build_timeout)
            .finish()
    }
}

impl RebuildWorker {
    /// Creates a worker with no build timeout.
    pub fn new(
        store: Arc<dyn CacheStore>,
        registry: Arc<BuilderRegistry>,
        provider: Arc<dyn ContextProvider>,
    ) -> Self {
        RebuildWorker {
            store,
            registry,
            masquerade: Masquerade::new(provider),
            build_timeout: None,
        }
    }

    /// Bounds each builder run.
    pub fn build_timeout(mut self, build_timeout: Option<Duration>) -> Self {
        self.build_timeout = build_timeout;
        self
    }

    /// Rebuilds and stores the content a job describes.
    pub async fn rebuild(&self, job: &RebuildJob) -> Result<(), CoordinatorError> {
        let build = self.registry.execute(&job.builder, self.build_timeout);
        let data = self.masquerade.run(job.context.clone(), build).await??;

        let entry = CacheEntry::fresh(data, Utc::now(), job.ttl);
        self.store.set(&job.fingerprint, entry).await?;
        Ok(())
    }
}

#[async_trait]
impl JobHandler for RebuildWorker {
    async fn on_job(&self, job: RebuildJob) -> Result<(), HandlerError> {
        let span = info_span!(
            "lazybox.rebuild",
            fingerprint = %job.fingerprint,
            builder = %job.builder,
        );
        async move {
            let started = Instant::now();
            match self.rebuild(&job).await {
                Ok(()) => {
                    debug!(elapsed = ?started.elapsed(), "rebuilt");
                    record_rebuild("completed", started.elapsed());
                    Ok(())
                }
                Err(error) => {
                    error!(%error, "deferred rebuild failed");
                    record_rebuild("failed", started.elapsed());
                    Err(HandlerError::from(error))
                }
            }
        }
        .instrument(span)
        .await
    }
}
