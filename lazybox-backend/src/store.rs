use std::sync::Arc;

use async_trait::async_trait;
use lazybox_core::{CacheEntry, Fingerprint};

use crate::BackendResult;

/// Key-value storage for built content.
///
/// Implementations must be safe for concurrent use by many coordinators,
/// possibly in different processes. `set` overwrites unconditionally; the
/// entry carries its own expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, fingerprint: &Fingerprint) -> BackendResult<Option<CacheEntry>>;

    async fn set(&self, fingerprint: &Fingerprint, entry: CacheEntry) -> BackendResult<()>;

    /// Returns the name of this store for logs and metrics labels.
    fn name(&self) -> &str {
        "store"
    }
}

#[async_trait]
impl CacheStore for &dyn CacheStore {
    async fn get(&self, fingerprint: &Fingerprint) -> BackendResult<Option<CacheEntry>> {
        (*self).get(fingerprint).await
    }

    async fn set(&self, fingerprint: &Fingerprint, entry: CacheEntry) -> BackendResult<()> {
        (*self).set(fingerprint, entry).await
    }

    fn name(&self) -> &str {
        (*self).name()
    }
}

#[async_trait]
impl CacheStore for Box<dyn CacheStore> {
    async fn get(&self, fingerprint: &Fingerprint) -> BackendResult<Option<CacheEntry>> {
        (**self).get(fingerprint).await
    }

    async fn set(&self, fingerprint: &Fingerprint, entry: CacheEntry) -> BackendResult<()> {
        (**self).set(fingerprint, entry).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl CacheStore for Arc<dyn CacheStore> {
    async fn get(&self, fingerprint: &Fingerprint) -> BackendResult<Option<CacheEntry>> {
        (**self).get(fingerprint).await
    }

    async fn set(&self, fingerprint: &Fingerprint, entry: CacheEntry) -> BackendResult<()> {
        (**self).set(fingerprint, entry).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
