use std::sync::Arc;

use lazybox_backend::{CacheStore, JobQueue, LockService};
use lazybox_core::{DefaultFingerprint, FingerprintGenerator};

use super::Coordinator;
use crate::config::{ConfigError, CoordinatorConfig};
use crate::registry::BuilderRegistry;

/// Marker type for unset builder fields.
///
/// When you see `NotSet` in a compiler error, the corresponding collaborator
/// (store, lock or queue) has not been provided yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotSet;

/// Builder for [`Coordinator`].
///
/// Use [`Coordinator::builder()`] to create a new builder. The store, the lock
/// service and the queue are required; `build()` only exists once all three
/// are set.
pub struct CoordinatorBuilder<S, L, Q> {
    store: S,
    lock: L,
    queue: Q,
    registry: Option<Arc<BuilderRegistry>>,
    fingerprints: Option<Arc<dyn FingerprintGenerator>>,
    config: CoordinatorConfig,
}

impl CoordinatorBuilder<NotSet, NotSet, NotSet> {
    /// Creates a new builder with no collaborators set.
    pub fn new() -> Self {
        Self {
            store: NotSet,
            lock: NotSet,
            queue: NotSet,
            registry: None,
            fingerprints: None,
            config: CoordinatorConfig::default(),
        }
    }
}

impl Default for CoordinatorBuilder<NotSet, NotSet, NotSet> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, L, Q> CoordinatorBuilder<S, L, Q> {
    /// Sets the content store.
    pub fn store(self, store: Arc<dyn CacheStore>) -> CoordinatorBuilder<Arc<dyn CacheStore>, L, Q> {
        CoordinatorBuilder {
            store,
            lock: self.lock,
            queue: self.queue,
            registry: self.registry,
            fingerprints: self.fingerprints,
            config: self.config,
        }
    }

    /// Sets the lock service.
    pub fn lock(self, lock: Arc<dyn LockService>) -> CoordinatorBuilder<S, Arc<dyn LockService>, Q> {
        CoordinatorBuilder {
            store: self.store,
            lock,
            queue: self.queue,
            registry: self.registry,
            fingerprints: self.fingerprints,
            config: self.config,
        }
    }

    /// Sets the rebuild queue.
    pub fn queue(self, queue: Arc<dyn JobQueue>) -> CoordinatorBuilder<S, L, Arc<dyn JobQueue>> {
        CoordinatorBuilder {
            store: self.store,
            lock: self.lock,
            queue,
            registry: self.registry,
            fingerprints: self.fingerprints,
            config: self.config,
        }
    }

    /// Sets the builder registry.
    ///
    /// # Default
    ///
    /// An empty registry, reachable through [`Coordinator::registry`].
    pub fn registry(self, registry: Arc<BuilderRegistry>) -> Self {
        Self {
            registry: Some(registry),
            ..self
        }
    }

    /// Sets the fingerprint generator.
    ///
    /// # Default
    ///
    /// [`DefaultFingerprint`]
    pub fn fingerprints(self, fingerprints: impl FingerprintGenerator + 'static) -> Self {
        Self {
            fingerprints: Some(Arc::new(fingerprints)),
            ..self
        }
    }

    /// Sets the timing configuration.
    pub fn config(self, config: CoordinatorConfig) -> Self {
        Self { config, ..self }
    }
}

impl CoordinatorBuilder<Arc<dyn CacheStore>, Arc<dyn LockService>, Arc<dyn JobQueue>> {
    /// Validates the configuration and builds the [`Coordinator`].
    pub fn build(self) -> Result<Coordinator, ConfigError> {
        self.config.validate()?;
        Ok(Coordinator {
            store: self.store,
            lock: self.lock,
            queue: self.queue,
            registry: self.registry.unwrap_or_default(),
            fingerprints: self
                .fingerprints
                .unwrap_or_else(|| Arc::new(DefaultFingerprint::default())),
            config: self.config,
        })
    }
}
