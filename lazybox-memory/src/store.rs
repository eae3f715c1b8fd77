//! Moka-backed [`CacheStore`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use lazybox_backend::{BackendResult, CacheStore};
use lazybox_core::{CacheEntry, Fingerprint};
use moka::Expiry;
use moka::future::{Cache, CacheBuilder};
use smol_str::SmolStr;

// Keeps instant arithmetic inside moka's timer wheel from overflowing.
const MAX_KEEP: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Expiration policy evicting an entry `retention` after its own expiry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Expiration {
    retention: Duration,
}

impl Expiry<Fingerprint, CacheEntry> for Expiration {
    fn expire_after_create(
        &self,
        _key: &Fingerprint,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        self.calculate_ttl(value)
    }

    fn expire_after_update(
        &self,
        _key: &Fingerprint,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // Moka's default keeps the old deadline. A grace extension or a
        // rebuild must move it.
        self.calculate_ttl(value)
    }
}

impl Expiration {
    fn calculate_ttl(&self, value: &CacheEntry) -> Option<Duration> {
        value.expires_at().map(|expires_at| {
            let millis = (expires_at - Utc::now()).num_milliseconds();
            let left = Duration::from_millis(millis.unsigned_abs());
            let keep = if millis >= 0 {
                self.retention.saturating_add(left)
            } else {
                self.retention.saturating_sub(left)
            };
            keep.min(MAX_KEEP)
        })
    }
}

/// In-memory content store powered by Moka.
///
/// Entries are not evicted at their `expires_at`: the coordinator serves
/// expired content as stale while a refresh runs, so the store keeps every
/// entry for an extra `retention` period. Permanent entries are only ever
/// evicted for capacity.
///
/// ```
/// use std::time::Duration;
/// use lazybox_memory::MokaStore;
///
/// let store = MokaStore::builder(10_000)
///     .retention(Duration::from_secs(600))
///     .name("pages")
///     .build();
/// ```
///
/// # Caveats
///
/// - Data is **not shared** across processes
/// - Eviction is **best-effort**: moka runs its housekeeping lazily
#[derive(Clone)]
pub struct MokaStore {
    cache: Cache<Fingerprint, CacheEntry>,
    name: SmolStr,
}

impl std::fmt::Debug for MokaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaStore")
            .field("name", &self.name)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl MokaStore {
    /// Creates a builder for a store holding at most `max_entries` entries.
    pub fn builder(max_entries: u64) -> MokaStoreBuilder {
        MokaStoreBuilder::new(max_entries)
    }

    /// Returns the underlying moka cache.
    pub fn cache(&self) -> &Cache<Fingerprint, CacheEntry> {
        &self.cache
    }

    /// Publishes the current entry count.
    pub fn record_capacity(&self) {
        crate::metrics::record_entries(&self.name, self.cache.entry_count());
    }
}

#[async_trait]
impl CacheStore for MokaStore {
    async fn get(&self, fingerprint: &Fingerprint) -> BackendResult<Option<CacheEntry>> {
        Ok(self.cache.get(fingerprint).await)
    }

    async fn set(&self, fingerprint: &Fingerprint, entry: CacheEntry) -> BackendResult<()> {
        self.cache.insert(fingerprint.clone(), entry).await;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`MokaStore`].
#[derive(Debug, Clone)]
pub struct MokaStoreBuilder {
    max_entries: u64,
    retention: Duration,
    name: SmolStr,
}

impl MokaStoreBuilder {
    fn new(max_entries: u64) -> Self {
        MokaStoreBuilder {
            max_entries,
            retention: Duration::from_secs(3600),
            name: SmolStr::new_static("moka"),
        }
    }

    /// How long entries stay readable after they expire.
    ///
    /// # Default
    ///
    /// One hour.
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Sets the name used in logs and metrics labels.
    ///
    /// # Default
    ///
    /// `"moka"`
    pub fn name(mut self, name: impl Into<SmolStr>) -> Self {
        self.name = name.into();
        self
    }

    /// Builds the store.
    pub fn build(self) -> MokaStore {
        let cache = CacheBuilder::new(self.max_entries)
            .expire_after(Expiration {
                retention: self.retention,
            })
            .build();
        MokaStore {
            cache,
            name: self.name,
        }
    }
}
