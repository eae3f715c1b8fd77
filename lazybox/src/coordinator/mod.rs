//! The cache-fill coordinator.
//!
//! One [`Coordinator::build`] call answers "what do I return right now for
//! this request?" in a bounded number of passes. Each pass reads the cache
//! once and ends in one of these ways:
//!
//! ```text
//!                   ┌──────────── read cache ────────────┐
//!                   │                  │                 │
//!             fresh entry         stale entry       miss (or stale
//!                   │                  │            under FRESH)
//!                 Hit          try build lock            │
//!                              │           │       STATIC? ── Placeholder
//!                        acquired       locked           │
//!                  extend by grace,   Stale{Busy}   try build lock
//!                  enqueue, release                 │          │
//!                  Stale{Enqueued}             acquired      locked
//!                                            build inline,   wait,
//!                                            store, release  next pass
//!                                               Built
//! ```
//!
//! After `max_passes` reads that all ended in "locked", the call returns
//! [`Outcome::Exhausted`]. The LIVE policy skips all of the above and builds.
//!
//! Lock names are scoped per fingerprint, so unrelated content never
//! contends: `lazybox.build` guards inline builds and stale refreshes,
//! `lazybox.defer` guards the placeholder policy's enqueue.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use lazybox_backend::{CacheStore, JobQueue, LockName, LockService, LockStatus};
use lazybox_core::{
    BuilderRef, CacheEntry, ContextProvider, ExecutionContext, Fingerprint, FingerprintGenerator,
    Policy, Raw, RebuildJob,
};
use tracing::{Instrument, debug, error, info_span, warn};

use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::metrics::{record_enqueued, record_lock_wait, record_outcome};
use crate::registry::BuilderRegistry;
use crate::worker::RebuildWorker;

mod builder;
mod held;
mod outcome;

use held::HeldLock;

pub use builder::{CoordinatorBuilder, NotSet};
pub use outcome::{Outcome, Refresh};

/// Lock scope guarding inline builds and stale refreshes.
pub const BUILD_SCOPE: &str = "lazybox.build";

/// Lock scope guarding deferred builds under the placeholder policy.
pub const DEFER_SCOPE: &str = "lazybox.defer";

/// What to build and for whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// The builder and its bound arguments.
    pub builder: BuilderRef,
    /// The identity the content is built for.
    pub context: ExecutionContext,
}

impl BuildRequest {
    /// Creates a request.
    pub fn new(builder: BuilderRef, context: ExecutionContext) -> Self {
        BuildRequest { builder, context }
    }
}

/// Serves cached content, refreshing it lazily with at most one rebuild in
/// flight per fingerprint.
///
/// Cloning is cheap; clones share all collaborators.
///
/// ```
/// use std::sync::Arc;
/// use lazybox::{BuildRequest, Coordinator, Outcome};
/// use lazybox_core::{BuilderRef, ExecutionContext, Policy, Raw, builder_fn};
/// use lazybox_memory::{MemoryLock, MemoryQueue, MokaStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (queue, _receiver) = MemoryQueue::channel(64);
/// let coordinator = Coordinator::builder()
///     .store(Arc::new(MokaStore::builder(1_000).build()))
///     .lock(Arc::new(MemoryLock::new()))
///     .queue(Arc::new(queue))
///     .build()
///     .unwrap();
/// coordinator
///     .registry()
///     .register_function("front", builder_fn(|_| async { Ok(Raw::from("<h1>news</h1>")) }));
///
/// let request = BuildRequest::new(
///     BuilderRef::function("front", ()).unwrap(),
///     ExecutionContext::anonymous(),
/// );
/// let first = coordinator.build(&request, Policy::MISS).await.unwrap();
/// assert_eq!(first.status(), "built");
/// let second = coordinator.build(&request, Policy::MISS).await.unwrap();
/// assert_eq!(second, Outcome::Hit(Raw::from("<h1>news</h1>")));
/// # }
/// ```
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn CacheStore>,
    lock: Arc<dyn LockService>,
    queue: Arc<dyn JobQueue>,
    registry: Arc<BuilderRegistry>,
    fingerprints: Arc<dyn FingerprintGenerator>,
    config: CoordinatorConfig,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("store", &self.store.name())
            .field("lock", &self.lock.name())
            .field("queue", &self.queue.name())
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

impl Coordinator {
    /// Creates a new [`CoordinatorBuilder`].
    pub fn builder() -> CoordinatorBuilder<NotSet, NotSet, NotSet> {
        CoordinatorBuilder::new()
    }

    /// Returns the registry builders are resolved through.
    pub fn registry(&self) -> &Arc<BuilderRegistry> {
        &self.registry
    }

    /// Returns the timing configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Computes the fingerprint of a request.
    pub fn fingerprint(&self, request: &BuildRequest) -> Fingerprint {
        self.fingerprints
            .fingerprint(&request.builder, &request.context)
    }

    /// Creates the queue consumer matching this coordinator.
    ///
    /// The worker shares the store and the registry, and switches `provider`
    /// to each job's context while it builds.
    pub fn worker(&self, provider: Arc<dyn ContextProvider>) -> RebuildWorker {
        RebuildWorker::new(self.store.clone(), self.registry.clone(), provider)
            .build_timeout(self.config.build_timeout)
    }

    /// Produces content for `request` under `policy`.
    ///
    /// Builder failures and backend failures are returned as errors. Running
    /// out of passes is not an error: see [`Outcome::Exhausted`].
    pub async fn build(
        &self,
        request: &BuildRequest,
        policy: Policy,
    ) -> Result<Outcome, CoordinatorError> {
        let fingerprint = self.fingerprint(request);
        let span = info_span!(
            "lazybox.build",
            fingerprint = %fingerprint,
            policy = policy.name(),
        );
        let started = Instant::now();

        let outcome = self
            .run(request, &fingerprint, policy)
            .instrument(span)
            .await?;

        record_outcome(outcome.status(), policy.name(), started.elapsed());
        Ok(outcome)
    }

    async fn run(
        &self,
        request: &BuildRequest,
        fingerprint: &Fingerprint,
        policy: Policy,
    ) -> Result<Outcome, CoordinatorError> {
        if policy.bypass_cache {
            debug!("cache bypassed");
            let data = self
                .registry
                .execute(&request.builder, self.config.build_timeout)
                .await?;
            return Ok(Outcome::Live(data));
        }

        let now = Utc::now();
        let lock_name = LockName::new(BUILD_SCOPE, fingerprint);
        let max_passes = self.config.max_passes.get();

        for pass in 1..=max_passes {
            let entry = self
                .store
                .get(fingerprint)
                .await?
                .filter(|entry| !entry.is_empty());

            match entry {
                Some(entry) if !entry.is_stale_at(now, self.config.minimum_ttl) => {
                    debug!(pass, "fresh hit");
                    return Ok(Outcome::Hit(entry.into_data()));
                }
                Some(entry) if !policy.stale_is_miss => {
                    return self
                        .serve_stale(request, fingerprint, entry, now, &lock_name)
                        .await;
                }
                Some(_) => debug!(pass, "stale entry treated as miss"),
                None => debug!(pass, "miss"),
            }

            if policy.placeholder_on_miss {
                return self.defer(request, fingerprint, now).await;
            }

            match self
                .lock
                .try_acquire(&lock_name, self.config.lock_timeout)
                .await?
            {
                LockStatus::Acquired(token) => {
                    let held = HeldLock::new(self.lock.clone(), lock_name.clone(), token);
                    let data = self.render_front(request, fingerprint, held, now).await?;
                    return Ok(Outcome::Built(data));
                }
                LockStatus::Locked if pass < max_passes => {
                    debug!(pass, "rebuild in flight, waiting");
                    record_lock_wait(BUILD_SCOPE);
                    self.lock.wait(&lock_name).await?;
                }
                LockStatus::Locked => {}
            }
        }

        warn!(passes = max_passes, "content still locked, giving up");
        Ok(Outcome::Exhausted { passes: max_passes })
    }

    /// Builds inline, stores the result and releases the lock.
    ///
    /// The lock is released whatever the builder or the store did, and also
    /// when this future is dropped mid-build; a build failure leaves the cache
    /// untouched.
    async fn render_front(
        &self,
        request: &BuildRequest,
        fingerprint: &Fingerprint,
        held: HeldLock,
        now: DateTime<Utc>,
    ) -> Result<Raw, CoordinatorError> {
        let built = self
            .registry
            .execute(&request.builder, self.config.build_timeout)
            .await;

        let stored = match &built {
            Ok(data) => {
                let entry = CacheEntry::fresh(data.clone(), now, self.config.ttl);
                self.store.set(fingerprint, entry).await
            }
            Err(error) => {
                error!(%error, "inline build failed");
                Ok(())
            }
        };

        let released = held.release().await;

        let data = built?;
        stored?;
        released?;
        debug!(bytes = data.len(), "built and stored");
        Ok(data)
    }

    /// Serves `entry` and, if nobody else does, schedules its refresh.
    async fn serve_stale(
        &self,
        request: &BuildRequest,
        fingerprint: &Fingerprint,
        entry: CacheEntry,
        now: DateTime<Utc>,
        lock_name: &LockName,
    ) -> Result<Outcome, CoordinatorError> {
        let held = match self
            .lock
            .try_acquire(lock_name, self.config.lock_timeout)
            .await?
        {
            LockStatus::Acquired(token) => {
                HeldLock::new(self.lock.clone(), lock_name.clone(), token)
            }
            LockStatus::Locked => {
                debug!("stale, refresh already in flight");
                return Ok(Outcome::Stale {
                    data: entry.into_data(),
                    refresh: Refresh::Busy,
                });
            }
        };

        let data = entry.data().clone();
        let scheduled = self.enqueue_rebuild(request, fingerprint, entry, now).await;
        let released = held.release().await;

        let refresh = match scheduled {
            Ok(()) => {
                debug!("stale, refresh enqueued");
                Refresh::Enqueued
            }
            Err(error) => {
                error!(%error, "could not schedule refresh, serving stale content");
                Refresh::Failed
            }
        };
        released?;
        Ok(Outcome::Stale { data, refresh })
    }

    /// Extends `entry` by the grace period, then enqueues its rebuild.
    async fn enqueue_rebuild(
        &self,
        request: &BuildRequest,
        fingerprint: &Fingerprint,
        entry: CacheEntry,
        now: DateTime<Utc>,
    ) -> Result<(), CoordinatorError> {
        self.store
            .set(fingerprint, entry.with_grace(self.config.grace))
            .await?;
        self.queue
            .enqueue(self.job(request, fingerprint, now))
            .await?;
        record_enqueued(BUILD_SCOPE);
        Ok(())
    }

    /// Returns the placeholder, deferring the build unless someone else is.
    async fn defer(
        &self,
        request: &BuildRequest,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<Outcome, CoordinatorError> {
        let lock_name = LockName::new(DEFER_SCOPE, fingerprint);
        let refresh = match self
            .lock
            .try_acquire(&lock_name, self.config.lock_timeout)
            .await?
        {
            LockStatus::Acquired(token) => {
                let held = HeldLock::new(self.lock.clone(), lock_name.clone(), token);
                let queued = self
                    .queue
                    .enqueue(self.job(request, fingerprint, now))
                    .await;
                let released = held.release().await;
                let refresh = match queued {
                    Ok(()) => {
                        debug!("miss, build deferred");
                        record_enqueued(DEFER_SCOPE);
                        Refresh::Enqueued
                    }
                    Err(error) => {
                        error!(%error, "could not defer build");
                        Refresh::Failed
                    }
                };
                released?;
                refresh
            }
            LockStatus::Locked => {
                debug!("miss, build already being deferred");
                Refresh::Busy
            }
        };

        Ok(Outcome::Placeholder {
            data: Raw::from(self.config.placeholder.clone()),
            refresh,
        })
    }

    fn job(
        &self,
        request: &BuildRequest,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> RebuildJob {
        RebuildJob {
            fingerprint: fingerprint.clone(),
            builder: request.builder.clone(),
            context: request.context.clone(),
            ttl: self.config.ttl,
            minimum_ttl: self.config.minimum_ttl,
            grace: self.config.grace,
            enqueued_at: now,
        }
    }
}
