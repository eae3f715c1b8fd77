use std::sync::Arc;

use lazybox_backend::{BackendResult, LockName, LockService, LockToken};
use tokio::runtime::Handle;
use tracing::{error, warn};

/// A lock this call holds.
///
/// [`HeldLock::release`] is the normal exit. If the call is dropped first,
/// the release is spawned onto the current runtime; without one the lock is
/// left to expire.
pub(super) struct HeldLock {
    lock: Arc<dyn LockService>,
    name: LockName,
    token: Option<LockToken>,
}

impl HeldLock {
    pub(super) fn new(lock: Arc<dyn LockService>, name: LockName, token: LockToken) -> Self {
        HeldLock {
            lock,
            name,
            token: Some(token),
        }
    }

    pub(super) async fn release(mut self) -> BackendResult<()> {
        let Some(token) = self.token else {
            return Ok(());
        };
        // Releasing twice is a no-op, so a cancelled release is retried on drop.
        let released = self.lock.release(&self.name, token).await;
        self.token = None;
        released
    }
}

impl Drop for HeldLock {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            warn!(lock = %self.name, "no runtime to release abandoned lock, leaving it to expire");
            return;
        };
        warn!(lock = %self.name, "call dropped while holding lock, releasing in background");
        let lock = self.lock.clone();
        let name = self.name.clone();
        handle.spawn(async move {
            if let Err(error) = lock.release(&name, token).await {
                error!(%error, lock = %name, "background lock release failed");
            }
        });
    }
}
