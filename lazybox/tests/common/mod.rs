//! Recording collaborators for coordinator tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use lazybox::{
    BuildError, BuildRequest, BuilderRef, CacheEntry, Coordinator, CoordinatorConfig,
    DefaultFingerprint, ExecutionContext, Fingerprint, FingerprintGenerator, Raw, RebuildJob,
    builder_fn,
};
use lazybox_backend::{
    BackendError, BackendResult, CacheStore, JobQueue, LockName, LockService, LockStatus,
    LockToken,
};

/// Store counting reads and keeping every write.
#[derive(Default)]
pub struct RecordingStore {
    entries: DashMap<Fingerprint, CacheEntry>,
    reads: AtomicU32,
    writes: Mutex<Vec<(Fingerprint, CacheEntry)>>,
    fail_writes: AtomicBool,
}

impl RecordingStore {
    pub fn with_entry(fingerprint: &Fingerprint, entry: CacheEntry) -> Self {
        let store = RecordingStore::default();
        store.entries.insert(fingerprint.clone(), entry);
        store
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<(Fingerprint, CacheEntry)> {
        self.writes.lock().unwrap().clone()
    }

    /// Writes behind the coordinator's back, as another instance would.
    pub fn insert(&self, fingerprint: &Fingerprint, entry: CacheEntry) {
        self.entries.insert(fingerprint.clone(), entry);
    }

    pub fn entry(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        self.entries.get(fingerprint).map(|entry| entry.clone())
    }
}

#[async_trait]
impl CacheStore for RecordingStore {
    async fn get(&self, fingerprint: &Fingerprint) -> BackendResult<Option<CacheEntry>> {
        // Behave like a remote store: other tasks run while we wait.
        tokio::task::yield_now().await;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.entry(fingerprint))
    }

    async fn set(&self, fingerprint: &Fingerprint, entry: CacheEntry) -> BackendResult<()> {
        tokio::task::yield_now().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::connection("store is down"));
        }
        self.writes
            .lock()
            .unwrap()
            .push((fingerprint.clone(), entry.clone()));
        self.entries.insert(fingerprint.clone(), entry);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Lock answering `Locked` a scripted number of times, then granting.
#[derive(Default)]
pub struct ScriptedLock {
    refusals: AtomicU32,
    acquired: AtomicU32,
    waits: AtomicU32,
    released: Mutex<Vec<(LockName, LockToken)>>,
    tokens: AtomicU64,
    on_wait: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ScriptedLock {
    /// Grants every acquisition.
    pub fn free() -> Self {
        ScriptedLock::default()
    }

    /// Refuses the first `refusals` acquisitions.
    pub fn refusing(refusals: u32) -> Self {
        ScriptedLock {
            refusals: AtomicU32::new(refusals),
            ..ScriptedLock::default()
        }
    }

    /// Never grants.
    pub fn held_forever() -> Self {
        ScriptedLock::refusing(u32::MAX)
    }

    /// Runs `hook` during the next `wait`, e.g. to land someone else's build.
    pub fn on_wait(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_wait.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn acquired(&self) -> u32 {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn waits(&self) -> u32 {
        self.waits.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> Vec<(LockName, LockToken)> {
        self.released.lock().unwrap().clone()
    }

    /// Total calls of any kind.
    pub fn calls(&self) -> u32 {
        self.acquired() + self.waits() + self.released().len() as u32
    }
}

#[async_trait]
impl LockService for ScriptedLock {
    async fn try_acquire(&self, _name: &LockName, _ttl: Duration) -> BackendResult<LockStatus> {
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Ok(LockStatus::Locked);
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let token = self.tokens.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(LockStatus::Acquired(LockToken::new(token)))
    }

    async fn wait(&self, _name: &LockName) -> BackendResult<()> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        let hook = self.on_wait.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }

    async fn release(&self, name: &LockName, token: LockToken) -> BackendResult<()> {
        self.released.lock().unwrap().push((name.clone(), token));
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Queue keeping every job, or rejecting them all.
#[derive(Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<RebuildJob>>,
    rejecting: bool,
}

impl RecordingQueue {
    pub fn rejecting() -> Self {
        RecordingQueue {
            rejecting: true,
            ..RecordingQueue::default()
        }
    }

    pub fn jobs(&self) -> Vec<RebuildJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, job: RebuildJob) -> BackendResult<()> {
        if self.rejecting {
            return Err(BackendError::connection("broker unreachable"));
        }
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Collaborators of one coordinator under test.
pub struct Harness {
    pub store: Arc<RecordingStore>,
    pub lock: Arc<ScriptedLock>,
    pub queue: Arc<RecordingQueue>,
    pub builds: Arc<AtomicU32>,
    pub coordinator: Coordinator,
}

impl Harness {
    pub fn new(store: RecordingStore, lock: ScriptedLock, queue: RecordingQueue) -> Self {
        Harness::with_config(store, lock, queue, config())
    }

    pub fn with_config(
        store: RecordingStore,
        lock: ScriptedLock,
        queue: RecordingQueue,
        config: CoordinatorConfig,
    ) -> Self {
        let store = Arc::new(store);
        let lock = Arc::new(lock);
        let queue = Arc::new(queue);
        let coordinator = Coordinator::builder()
            .store(store.clone())
            .lock(lock.clone())
            .queue(queue.clone())
            .config(config)
            .build()
            .unwrap();

        let builds = Arc::new(AtomicU32::new(0));
        let counter = builds.clone();
        coordinator.registry().register_function(
            "block",
            builder_fn(move |args| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(Raw::from(format!("{} v{n}", args[0].as_str().unwrap_or(""))))
                }
            }),
        );
        coordinator.registry().register_function(
            "broken",
            builder_fn(|_| async { Err(BuildError::failed("template missing")) }),
        );

        Harness {
            store,
            lock,
            queue,
            builds,
            coordinator,
        }
    }

    pub fn builds(&self) -> u32 {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn fingerprint(&self, request: &BuildRequest) -> Fingerprint {
        self.coordinator.fingerprint(request)
    }
}

/// Configuration with the default timings.
pub fn config() -> CoordinatorConfig {
    CoordinatorConfig::default()
}

/// A request for the counting `block` builder.
pub fn request(name: &str) -> BuildRequest {
    BuildRequest::new(
        BuilderRef::function("block", (name,)).unwrap(),
        ExecutionContext::new(7, 2),
    )
}

/// A request for a builder that always fails.
pub fn broken_request() -> BuildRequest {
    BuildRequest::new(
        BuilderRef::function("broken", ()).unwrap(),
        ExecutionContext::new(7, 2),
    )
}

/// The key the default generator gives `request`.
pub fn fingerprint_of(request: &BuildRequest) -> Fingerprint {
    DefaultFingerprint::default().fingerprint(&request.builder, &request.context)
}

/// An entry expiring `left` from now.
pub fn expiring_in(data: &'static str, left: Duration) -> CacheEntry {
    let now = Utc::now();
    CacheEntry::new(Raw::from(data), now, Some(at(now, left)))
}

fn at(now: DateTime<Utc>, left: Duration) -> DateTime<Utc> {
    now + chrono::Duration::from_std(left).unwrap()
}
