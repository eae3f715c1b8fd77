//! In-process deferred queue and its worker loop.
//!
//! Jobs cross the queue as encoded bytes, exactly as they would through an
//! external broker, so a job that cannot be encoded fails at enqueue time and
//! a worker only ever sees what survived the round trip.

use std::sync::Arc;

use async_trait::async_trait;
use lazybox_backend::format::JsonFormat;
use lazybox_backend::{BackendError, BackendResult, JobFormat, JobHandler, JobQueue};
use lazybox_core::Raw;
use smol_str::SmolStr;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::metrics::record_job;

/// Producer half of an in-process queue.
///
/// The queue is bounded: when it is full, [`enqueue`](JobQueue::enqueue)
/// fails instead of waiting, the same way a saturated broker rejects work.
#[derive(Clone)]
pub struct MemoryQueue {
    sender: mpsc::Sender<Raw>,
    format: Arc<dyn JobFormat>,
}

impl std::fmt::Debug for MemoryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryQueue")
            .field("format", &self.format)
            .field("len", &self.len())
            .finish()
    }
}

/// Consumer half of an in-process queue, handed to a [`QueueRuntime`].
#[derive(Debug)]
pub struct QueueReceiver {
    receiver: mpsc::Receiver<Raw>,
    format: Arc<dyn JobFormat>,
}

impl MemoryQueue {
    /// Creates a JSON-encoded queue holding at most `capacity` pending jobs.
    pub fn channel(capacity: usize) -> (MemoryQueue, QueueReceiver) {
        Self::channel_with_format(capacity, JsonFormat)
    }

    /// Creates a queue encoding jobs with `format`.
    pub fn channel_with_format(
        capacity: usize,
        format: impl JobFormat + 'static,
    ) -> (MemoryQueue, QueueReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let format: Arc<dyn JobFormat> = Arc::new(format);
        (
            MemoryQueue {
                sender,
                format: format.clone(),
            },
            QueueReceiver { receiver, format },
        )
    }

    /// Returns the number of jobs waiting for a worker.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Returns `true` if no job is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: lazybox_core::RebuildJob) -> BackendResult<()> {
        let payload = self.format.encode(&job)?;
        self.sender.try_send(payload).map_err(|error| match error {
            TrySendError::Full(_) => BackendError::connection("queue is full"),
            TrySendError::Closed(_) => BackendError::connection("queue is closed"),
        })?;
        debug!(fingerprint = %job.fingerprint, "job enqueued");
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Counters reported by [`QueueRuntime::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Jobs the handler finished successfully.
    pub completed: u64,
    /// Failed deliveries that were retried.
    pub redelivered: u64,
    /// Jobs given up on, either undecodable or out of deliveries.
    pub dropped: u64,
}

/// Worker loop draining a [`QueueReceiver`] into a [`JobHandler`].
///
/// Jobs are handled one at a time, in arrival order. A failed job is handed
/// to the handler again until it succeeds or `max_deliveries` is reached,
/// then dropped with an error log.
///
/// ```no_run
/// # use lazybox_backend::JobHandler;
/// # async fn run(handler: impl JobHandler + 'static) {
/// use lazybox_memory::{MemoryQueue, QueueRuntime};
///
/// let (queue, receiver) = MemoryQueue::channel(1024);
/// let runtime = QueueRuntime::builder(receiver, handler)
///     .max_deliveries(5)
///     .spawn();
/// // ... hand `queue` to coordinators ...
/// let stats = runtime.shutdown().await.unwrap();
/// # }
/// ```
#[derive(Debug)]
pub struct QueueRuntime {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<QueueStats>,
}

impl QueueRuntime {
    /// Creates a builder for a runtime feeding `handler` from `receiver`.
    pub fn builder<H>(receiver: QueueReceiver, handler: H) -> QueueRuntimeBuilder<H>
    where
        H: JobHandler + 'static,
    {
        QueueRuntimeBuilder {
            receiver,
            handler,
            max_deliveries: 3,
            name: SmolStr::new_static("memory"),
        }
    }

    /// Stops accepting jobs, handles everything already queued and stops.
    pub async fn shutdown(self) -> BackendResult<QueueStats> {
        // The loop may already be gone if every producer was dropped.
        let _ = self.shutdown.send(());
        self.handle.await.map_err(BackendError::internal)
    }

    /// Returns `true` once the worker loop has stopped.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Builder for [`QueueRuntime`].
pub struct QueueRuntimeBuilder<H> {
    receiver: QueueReceiver,
    handler: H,
    max_deliveries: u32,
    name: SmolStr,
}

impl<H> QueueRuntimeBuilder<H>
where
    H: JobHandler + 'static,
{
    /// Sets how many times one job is handed to the handler at most.
    ///
    /// # Default
    ///
    /// `3`. Values below one are raised to one.
    pub fn max_deliveries(mut self, max_deliveries: u32) -> Self {
        self.max_deliveries = max_deliveries.max(1);
        self
    }

    /// Sets the runtime name recorded on its tracing span.
    pub fn name(mut self, name: impl Into<SmolStr>) -> Self {
        self.name = name.into();
        self
    }

    /// Spawns the worker loop on the current tokio runtime.
    pub fn spawn(self) -> QueueRuntime {
        let (shutdown, stop) = oneshot::channel();
        let span = info_span!("lazybox.worker", runtime = %self.name);
        let worker = Worker {
            format: self.receiver.format,
            handler: self.handler,
            max_deliveries: self.max_deliveries,
            stats: QueueStats::default(),
        };
        let handle = tokio::spawn(worker.run(self.receiver.receiver, stop).instrument(span));
        QueueRuntime { shutdown, handle }
    }
}

struct Worker<H> {
    format: Arc<dyn JobFormat>,
    handler: H,
    max_deliveries: u32,
    stats: QueueStats,
}

impl<H> Worker<H>
where
    H: JobHandler,
{
    async fn run(
        mut self,
        mut receiver: mpsc::Receiver<Raw>,
        mut stop: oneshot::Receiver<()>,
    ) -> QueueStats {
        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                payload = receiver.recv() => match payload {
                    Some(payload) => self.deliver(payload).await,
                    None => {
                        debug!("all producers gone, worker stopping");
                        return self.stats;
                    }
                },
            }
        }

        receiver.close();
        while let Some(payload) = receiver.recv().await {
            self.deliver(payload).await;
        }
        debug!(stats = ?self.stats, "worker drained and stopped");
        self.stats
    }

    async fn deliver(&mut self, payload: Raw) {
        let job = match self.format.decode(&payload) {
            Ok(job) => job,
            Err(error) => {
                error!(%error, "dropping undecodable job");
                self.stats.dropped += 1;
                record_job("dropped");
                return;
            }
        };

        let span = info_span!(
            "lazybox.job",
            fingerprint = %job.fingerprint,
            builder = %job.builder,
        );
        async {
            for delivery in 1..=self.max_deliveries {
                match self.handler.on_job(job.clone()).await {
                    Ok(()) => {
                        self.stats.completed += 1;
                        record_job("completed");
                        return;
                    }
                    Err(error) if delivery < self.max_deliveries => {
                        warn!(delivery, %error, "job failed, redelivering");
                        self.stats.redelivered += 1;
                        record_job("redelivered");
                    }
                    Err(error) => {
                        error!(delivery, %error, "job failed, dropping");
                        self.stats.dropped += 1;
                        record_job("dropped");
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}
