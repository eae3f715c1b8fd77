//! Simple in-memory test store implementation using DashMap.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use lazybox_backend::{BackendResult, CacheStore};
use lazybox_core::{CacheEntry, Fingerprint};

/// Simple in-memory store for testing using DashMap.
///
/// Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct TestStore {
    store: Arc<DashMap<Fingerprint, CacheEntry>>,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, fingerprint: &Fingerprint) -> bool {
        self.store.contains_key(fingerprint)
    }
}

#[async_trait]
impl CacheStore for TestStore {
    async fn get(&self, fingerprint: &Fingerprint) -> BackendResult<Option<CacheEntry>> {
        Ok(self.store.get(fingerprint).map(|entry| entry.clone()))
    }

    async fn set(&self, fingerprint: &Fingerprint, entry: CacheEntry) -> BackendResult<()> {
        self.store.insert(fingerprint.clone(), entry);
        Ok(())
    }

    fn name(&self) -> &str {
        "test"
    }
}
