//! Single-flight lock contract.
//!
//! A lock is named after the coordinator operation it guards and the
//! fingerprint it guards it for, so unrelated content never contends. Each
//! lock also has a lifetime of its own, independent from any content TTL: if
//! a holder dies mid-rebuild the lock expires and a later caller can take over.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lazybox_core::{Fingerprint, SEPARATOR};
use smol_str::SmolStr;

use crate::BackendResult;

/// Name of a single-flight lock: `{scope}|{fingerprint}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LockName {
    scope: SmolStr,
    name: Arc<str>,
}

impl LockName {
    /// Builds the lock name guarding `scope` for `fingerprint`.
    pub fn new(scope: impl Into<SmolStr>, fingerprint: &Fingerprint) -> Self {
        let scope = scope.into();
        let name = Arc::from(format!("{scope}{SEPARATOR}{fingerprint}"));
        LockName { scope, name }
    }

    /// Returns the operation scope.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns the full lock name.
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for LockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Proof of ownership handed out by a successful acquire.
///
/// Only the matching token releases a lock, so a late release from a holder
/// whose lock already expired cannot free somebody else's lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LockToken(u64);

impl LockToken {
    /// Wraps a token value.
    pub const fn new(value: u64) -> Self {
        LockToken(value)
    }

    /// Returns the token value.
    pub const fn value(&self) -> u64 {
        self.0
    }
}

/// Outcome of a non-blocking acquire.
#[derive(Debug, PartialEq, Eq)]
pub enum LockStatus {
    /// Lock successfully created and acquired.
    Acquired(LockToken),
    /// Lock object already acquired (locked).
    Locked,
}

impl LockStatus {
    /// Returns the token when the lock was acquired.
    pub fn token(&self) -> Option<LockToken> {
        match self {
            LockStatus::Acquired(token) => Some(*token),
            LockStatus::Locked => None,
        }
    }
}

/// Named, TTL-bounded mutual exclusion shared by all coordinators.
#[async_trait]
pub trait LockService: Send + Sync {
    /// Tries to take `name` without waiting.
    ///
    /// `ttl` bounds how long the lock lives if never released, not how long
    /// the caller waits.
    async fn try_acquire(&self, name: &LockName, ttl: Duration) -> BackendResult<LockStatus>;

    /// Waits until `name` is observed released or expired.
    ///
    /// Best effort: returning does not mean the next acquire will succeed.
    async fn wait(&self, name: &LockName) -> BackendResult<()>;

    /// Releases `name` if `token` still holds it. Releasing twice is a no-op.
    async fn release(&self, name: &LockName, token: LockToken) -> BackendResult<()>;

    /// Returns the name of this lock service for logs and metrics labels.
    fn name(&self) -> &str {
        "lock"
    }
}

#[async_trait]
impl<T> LockService for Arc<T>
where
    T: LockService + ?Sized,
{
    async fn try_acquire(&self, name: &LockName, ttl: Duration) -> BackendResult<LockStatus> {
        (**self).try_acquire(name, ttl).await
    }

    async fn wait(&self, name: &LockName) -> BackendResult<()> {
        (**self).wait(name).await
    }

    async fn release(&self, name: &LockName, token: LockToken) -> BackendResult<()> {
        (**self).release(name, token).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
