//! Cached content with expiration metadata.
//!
//! A [`CacheEntry`] is either permanent (`expires_at` is `None`) or expires at a
//! concrete instant. Staleness is judged with a pre-emptive margin, the
//! *minimum TTL*: an entry is stale as soon as less than `minimum_ttl` is left
//! before it expires, so a refresh starts while the old content can still be
//! served.
//!
//! ```
//! use lazybox_core::CacheEntry;
//! use chrono::{TimeDelta, Utc};
//! use std::time::Duration;
//!
//! let now = Utc::now();
//! let margin = Duration::from_secs(100);
//!
//! let soon = CacheEntry::new("x", now, Some(now + TimeDelta::seconds(50)));
//! assert!(soon.is_stale_at(now, margin));
//!
//! let later = CacheEntry::new("x", now, Some(now + TimeDelta::seconds(150)));
//! assert!(!later.is_stale_at(now, margin));
//!
//! let forever = CacheEntry::new("x", now, None);
//! assert!(!forever.is_stale_at(now, margin));
//! ```

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::Raw;

/// Content stored under a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    data: Raw,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Creates an entry. `expires_at: None` makes it permanent.
    pub fn new(
        data: impl Into<Raw>,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        CacheEntry {
            data: data.into(),
            created_at,
            expires_at,
        }
    }

    /// Creates an entry built at `now` that expires `ttl` later.
    pub fn fresh(data: impl Into<Raw>, now: DateTime<Utc>, ttl: Duration) -> Self {
        CacheEntry::new(data, now, Some(shift(now, ttl)))
    }

    /// Returns the cached content.
    #[inline]
    pub fn data(&self) -> &Raw {
        &self.data
    }

    /// Returns when the content was built.
    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the content expires, `None` for permanent entries.
    #[inline]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Consumes the entry and returns the content.
    pub fn into_data(self) -> Raw {
        self.data
    }

    /// An empty payload is treated like a missing entry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Permanent entries are never stale.
    #[inline]
    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Is the entry stale at `now`, given the `minimum_ttl` margin?
    pub fn is_stale_at(&self, now: DateTime<Utc>, minimum_ttl: Duration) -> bool {
        self.expires_at.is_some_and(|expires_at| {
            expires_at
                .checked_sub_signed(to_delta(minimum_ttl))
                .is_none_or(|threshold| now > threshold)
        })
    }

    /// Is the entry stale right now?
    pub fn is_stale(&self, minimum_ttl: Duration) -> bool {
        self.is_stale_at(Utc::now(), minimum_ttl)
    }

    /// Returns the entry with `grace` added to its current expiry.
    ///
    /// The grace is added to the existing expiry, never counted from now, so an
    /// entry can only live longer. Permanent entries are returned unchanged.
    pub fn with_grace(self, grace: Duration) -> Self {
        CacheEntry {
            expires_at: self.expires_at.map(|at| shift(at, grace)),
            ..self
        }
    }

    /// Returns the time left before expiry, if any.
    pub fn ttl_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at
            .and_then(|at| (at - now).to_std().ok())
            .filter(|left| !left.is_zero())
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

// Saturates at the largest representable instant.
fn shift(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    at.checked_add_signed(to_delta(by))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
