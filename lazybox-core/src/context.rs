//! Execution context: who content is built for.
//!
//! Content may differ per user, per tenant (site/domain) and, for badly
//! behaved builders, per raw request path. [`ExecutionContext`] captures those
//! three values so a deferred rebuild can reproduce them exactly.
//!
//! The ambient, process-wide notion of "the current user" lives behind a
//! [`ContextProvider`]. The coordinator never reads it directly: requests hand
//! their context in explicitly, and the queue worker swaps it in only for the
//! duration of a masquerade.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Identity and tenant state under which content is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// The user on behalf of whom content is built. `0` is anonymous.
    pub user_id: u64,
    /// The tenant (domain) within which content is built. `0` is the default tenant.
    pub tenant_id: u64,
    /// The raw request path, for builders that read it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ExecutionContext {
    /// Creates a context for `user_id` within `tenant_id`.
    pub fn new(user_id: u64, tenant_id: u64) -> Self {
        ExecutionContext {
            user_id,
            tenant_id,
            path: None,
        }
    }

    /// The anonymous user on the default tenant.
    pub fn anonymous() -> Self {
        ExecutionContext::default()
    }

    /// Attaches a raw request path.
    pub fn with_path(self, path: impl Into<String>) -> Self {
        ExecutionContext {
            path: Some(path.into()),
            ..self
        }
    }
}

/// Access to the ambient execution context.
pub trait ContextProvider: Send + Sync {
    /// Returns the context currently installed.
    fn current(&self) -> ExecutionContext;

    /// Replaces the installed context.
    fn install(&self, context: ExecutionContext);
}

impl<T> ContextProvider for Arc<T>
where
    T: ContextProvider + ?Sized,
{
    fn current(&self) -> ExecutionContext {
        self.as_ref().current()
    }

    fn install(&self, context: ExecutionContext) {
        self.as_ref().install(context)
    }
}

/// Ambient context shared by everything in one execution unit.
///
/// Clones share state, so a builder holding a clone sees whatever the
/// worker installed.
#[derive(Debug, Clone, Default)]
pub struct AmbientContext {
    inner: Arc<RwLock<ExecutionContext>>,
}

impl AmbientContext {
    /// Creates a provider with `context` installed.
    pub fn new(context: ExecutionContext) -> Self {
        AmbientContext {
            inner: Arc::new(RwLock::new(context)),
        }
    }
}

impl ContextProvider for AmbientContext {
    fn current(&self) -> ExecutionContext {
        // A poisoned lock still holds a complete context value.
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn install(&self, context: ExecutionContext) {
        match self.inner.write() {
            Ok(mut guard) => *guard = context,
            Err(poisoned) => *poisoned.into_inner() = context,
        }
    }
}
