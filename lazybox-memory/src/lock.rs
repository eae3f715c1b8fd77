//! In-process single-flight lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use lazybox_backend::{BackendResult, LockName, LockService, LockStatus, LockToken};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::trace;

// Deadline used when `now + ttl` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

#[derive(Debug)]
struct Holder {
    token: LockToken,
    expires: Instant,
    released: Arc<Notify>,
}

/// Lock service for coordinators sharing one process.
///
/// Each held lock records its owner token and deadline. A holder past its
/// deadline counts as gone: the next acquirer takes the lock over and any
/// waiter is woken. Waiters never poll; they sleep until the holder releases
/// or its deadline passes, whichever comes first.
#[derive(Debug, Default)]
pub struct MemoryLock {
    holders: DashMap<LockName, Holder>,
    tokens: AtomicU64,
}

impl MemoryLock {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `name` is held by a live holder.
    pub fn is_locked(&self, name: &LockName) -> bool {
        self.holders
            .get(name)
            .is_some_and(|holder| holder.expires > Instant::now())
    }

    fn next_token(&self) -> LockToken {
        LockToken::new(self.tokens.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl LockService for MemoryLock {
    async fn try_acquire(&self, name: &LockName, ttl: Duration) -> BackendResult<LockStatus> {
        let now = Instant::now();
        let holder = Holder {
            token: self.next_token(),
            expires: now.checked_add(ttl).unwrap_or(now + FAR_FUTURE),
            released: Arc::new(Notify::new()),
        };
        let token = holder.token;
        match self.holders.entry(name.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires > now {
                    return Ok(LockStatus::Locked);
                }
                trace!(lock = %name, "taking over expired lock");
                let expired = occupied.insert(holder);
                expired.released.notify_waiters();
            }
            Entry::Vacant(vacant) => {
                vacant.insert(holder);
            }
        }
        Ok(LockStatus::Acquired(token))
    }

    async fn wait(&self, name: &LockName) -> BackendResult<()> {
        let (token, expires, released) = match self.holders.get(name) {
            Some(holder) => (holder.token, holder.expires, holder.released.clone()),
            None => return Ok(()),
        };

        let notified = released.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        // The holder may have left between the lookup and the registration.
        let still_held = self
            .holders
            .get(name)
            .is_some_and(|holder| holder.token == token);
        if !still_held {
            return Ok(());
        }

        let _ = tokio::time::timeout_at(expires, notified).await;
        Ok(())
    }

    async fn release(&self, name: &LockName, token: LockToken) -> BackendResult<()> {
        if let Some((_, holder)) = self
            .holders
            .remove_if(name, |_, holder| holder.token == token)
        {
            holder.released.notify_waiters();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
