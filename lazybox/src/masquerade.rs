//! Scoped identity substitution for deferred rebuilds.
//!
//! A queue worker has no request of its own. Before it runs a builder it
//! installs the context recorded in the job, and it must put the previous
//! context back afterwards however the builder ends. [`Masquerade::run`]
//! does both: restoration lives in a drop guard, so it also happens when the
//! builder returns an error, panics, or when the whole future is dropped
//! half-way (e.g. by a timeout).

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lazybox_core::{ContextProvider, ExecutionContext};
use thiserror::Error;
use tracing::debug;

/// Masquerade failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MasqueradeError {
    /// A masquerade is already active on this provider.
    #[error("masquerade is already active")]
    Nested,
}

/// Swaps the ambient context of one provider for the duration of a future.
///
/// Not reentrant: one `Masquerade` runs at most one scope at a time, and a
/// second concurrent or nested [`run`](Masquerade::run) is rejected without
/// touching the ambient context.
///
/// ```
/// use std::sync::Arc;
/// use lazybox::Masquerade;
/// use lazybox_core::{AmbientContext, ContextProvider, ExecutionContext};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ambient = AmbientContext::default();
/// let masquerade = Masquerade::new(Arc::new(ambient.clone()));
///
/// let seen = masquerade
///     .run(ExecutionContext::new(42, 7), async { ambient.current().user_id })
///     .await
///     .unwrap();
/// assert_eq!(seen, 42);
/// assert_eq!(ambient.current(), ExecutionContext::anonymous());
/// # }
/// ```
pub struct Masquerade {
    provider: Arc<dyn ContextProvider>,
    active: AtomicBool,
}

impl std::fmt::Debug for Masquerade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Masquerade")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Masquerade {
    /// Wraps the provider whose context is swapped.
    pub fn new(provider: Arc<dyn ContextProvider>) -> Self {
        Masquerade {
            provider,
            active: AtomicBool::new(false),
        }
    }

    /// Returns `true` while a scope is running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Runs `future` with `context` installed, then restores the previous context.
    pub async fn run<F>(&self, context: ExecutionContext, future: F) -> Result<F::Output, MasqueradeError>
    where
        F: Future,
    {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(MasqueradeError::Nested);
        }

        let _restore = Restore {
            masquerade: self,
            saved: self.provider.current(),
        };
        debug!(
            user_id = context.user_id,
            tenant_id = context.tenant_id,
            "entering masquerade"
        );
        self.provider.install(context);

        Ok(future.await)
    }
}

struct Restore<'a> {
    masquerade: &'a Masquerade,
    saved: ExecutionContext,
}

impl Drop for Restore<'_> {
    fn drop(&mut self) {
        let saved = std::mem::take(&mut self.saved);
        debug!(
            user_id = saved.user_id,
            tenant_id = saved.tenant_id,
            "leaving masquerade"
        );
        self.masquerade.provider.install(saved);
        self.masquerade.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazybox_core::AmbientContext;

    fn setup() -> (AmbientContext, Masquerade) {
        let ambient = AmbientContext::new(ExecutionContext::new(1, 1).with_path("admin"));
        let masquerade = Masquerade::new(Arc::new(ambient.clone()));
        (ambient, masquerade)
    }

    #[tokio::test]
    async fn context_is_installed_then_restored() {
        let (ambient, masquerade) = setup();
        let before = ambient.current();
        let target = ExecutionContext::new(9, 3).with_path("node/9");

        let inside = masquerade
            .run(target.clone(), async { ambient.current() })
            .await
            .unwrap();

        assert_eq!(inside, target);
        assert_eq!(ambient.current(), before);
        assert!(!masquerade.is_active());
    }

    #[tokio::test]
    async fn restored_after_failure() {
        let (ambient, masquerade) = setup();
        let before = ambient.current();

        let result: Result<(), &str> = masquerade
            .run(ExecutionContext::new(9, 3), async { Err("builder failed") })
            .await
            .unwrap();

        assert!(result.is_err());
        assert_eq!(ambient.current(), before);
    }

    #[tokio::test]
    async fn restored_when_dropped_mid_flight() {
        let (ambient, masquerade) = setup();
        let before = ambient.current();

        let pending = masquerade.run(ExecutionContext::new(9, 3), std::future::pending::<()>());
        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(10), pending).await;

        assert!(timed_out.is_err());
        assert_eq!(ambient.current(), before);
        assert!(!masquerade.is_active());
    }

    #[tokio::test]
    async fn nested_run_is_rejected() {
        let (ambient, masquerade) = setup();

        let nested = masquerade
            .run(ExecutionContext::new(9, 3), async {
                let inner = masquerade
                    .run(ExecutionContext::new(5, 5), async { ambient.current() })
                    .await;
                (inner, ambient.current())
            })
            .await
            .unwrap();

        assert_eq!(nested.0, Err(MasqueradeError::Nested));
        assert_eq!(nested.1, ExecutionContext::new(9, 3));
    }
}
