//! Fingerprints: deterministic cache keys.
//!
//! A [`Fingerprint`] identifies one (builder, arguments, identity) triple. It
//! is the cache key of the content and the scope of the rebuild lock, so two
//! requests that must not share content must never share a fingerprint.
//!
//! ## Format
//!
//! [`DefaultFingerprint`] joins its parts with the reserved
//! [`SEPARATOR`](crate::SEPARATOR):
//!
//! `{kind}|{identifier}|{args-json}|{tenant}|{user}`
//!
//! Identifiers never contain the separator and the two trailing ids are
//! numeric, so the arguments segment is unambiguous even when the JSON text
//! contains the separator itself.
//!
//! ```
//! use lazybox_core::{BuilderRef, DefaultFingerprint, ExecutionContext, FingerprintGenerator};
//!
//! let builder = BuilderRef::function("block_view", ("sidebar", 3)).unwrap();
//! let context = ExecutionContext::new(69, 42);
//!
//! let fingerprint = DefaultFingerprint::default().fingerprint(&builder, &context);
//! assert_eq!(fingerprint.as_str(), r#"function|block_view|["sidebar",3]|42|69"#);
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::builder::BuilderRef;
use crate::context::ExecutionContext;
use crate::SEPARATOR;

/// A deterministic cache key.
///
/// Cloning only increments a reference count.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint {
    inner: Arc<str>,
}

impl Fingerprint {
    /// Wraps a precomputed key.
    pub fn new(key: impl AsRef<str>) -> Self {
        Fingerprint {
            inner: Arc::from(key.as_ref()),
        }
    }

    /// Returns the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl From<&str> for Fingerprint {
    fn from(key: &str) -> Self {
        Fingerprint::new(key)
    }
}

impl From<String> for Fingerprint {
    fn from(key: String) -> Self {
        Fingerprint {
            inner: Arc::from(key),
        }
    }
}

/// Derives a fingerprint from a builder and the context it runs for.
///
/// Implementations must be pure functions of their inputs and stable across
/// process restarts: deferred jobs carry the fingerprint computed at request
/// time. Closures with the matching signature implement this trait, which is
/// the usual way to vary cache granularity (per role, per locale, ...).
///
/// ```
/// use lazybox_core::{BuilderRef, ExecutionContext, Fingerprint, FingerprintGenerator};
///
/// // Share content across users of a tenant.
/// let per_tenant = |builder: &BuilderRef, context: &ExecutionContext| {
///     Fingerprint::from(format!("{builder}|{}", context.tenant_id))
/// };
/// let builder = BuilderRef::function("menu", ()).unwrap();
/// let a = per_tenant.fingerprint(&builder, &ExecutionContext::new(1, 5));
/// let b = per_tenant.fingerprint(&builder, &ExecutionContext::new(2, 5));
/// assert_eq!(a, b);
/// ```
pub trait FingerprintGenerator: Send + Sync {
    /// Computes the fingerprint.
    fn fingerprint(&self, builder: &BuilderRef, context: &ExecutionContext) -> Fingerprint;
}

impl<F> FingerprintGenerator for F
where
    F: Fn(&BuilderRef, &ExecutionContext) -> Fingerprint + Send + Sync,
{
    fn fingerprint(&self, builder: &BuilderRef, context: &ExecutionContext) -> Fingerprint {
        self(builder, context)
    }
}

/// Fingerprint varying on builder, arguments, tenant and user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultFingerprint {
    with_path: bool,
}

impl DefaultFingerprint {
    /// Also varies on the raw request path, for path-sensitive builders.
    pub fn with_path() -> Self {
        DefaultFingerprint { with_path: true }
    }
}

impl FingerprintGenerator for DefaultFingerprint {
    fn fingerprint(&self, builder: &BuilderRef, context: &ExecutionContext) -> Fingerprint {
        // Serializing a slice of `Value`s cannot fail.
        let args = if self.with_path {
            serde_json::to_string(&(builder.args(), &context.path))
        } else {
            serde_json::to_string(builder.args())
        }
        .unwrap_or_default();

        Fingerprint::from(format!(
            "{kind}{sep}{id}{sep}{args}{sep}{tenant}{sep}{user}",
            kind = builder.kind().as_str(),
            id = builder.identifier(),
            tenant = context.tenant_id,
            user = context.user_id,
            sep = SEPARATOR,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(args: impl Serialize) -> BuilderRef {
        BuilderRef::function("block_view", args).unwrap()
    }

    #[test]
    fn equal_inputs_give_equal_fingerprints() {
        let generator = DefaultFingerprint::default();
        let context = ExecutionContext::new(3, 1);
        assert_eq!(
            generator.fingerprint(&builder(("a", 1)), &context),
            generator.fingerprint(&builder(("a", 1)), &context),
        );
    }

    #[test]
    fn user_and_tenant_are_distinguished() {
        let generator = DefaultFingerprint::default();
        let b = builder(());
        let base = generator.fingerprint(&b, &ExecutionContext::new(1, 2));
        assert_ne!(base, generator.fingerprint(&b, &ExecutionContext::new(2, 1)));
        assert_ne!(base, generator.fingerprint(&b, &ExecutionContext::new(1, 3)));
    }

    #[test]
    fn separator_inside_args_does_not_collide() {
        let generator = DefaultFingerprint::default();
        let context = ExecutionContext::new(0, 0);
        assert_ne!(
            generator.fingerprint(&builder(("a|1",)), &context),
            generator.fingerprint(&builder(("a", "1")), &context),
        );
    }

    #[test]
    fn path_only_counts_when_requested() {
        let b = builder(());
        let one = ExecutionContext::new(0, 0).with_path("node/1");
        let two = ExecutionContext::new(0, 0).with_path("node/2");

        let plain = DefaultFingerprint::default();
        assert_eq!(plain.fingerprint(&b, &one), plain.fingerprint(&b, &two));

        let path_aware = DefaultFingerprint::with_path();
        assert_ne!(path_aware.fingerprint(&b, &one), path_aware.fingerprint(&b, &two));
    }

    #[test]
    fn method_kind_is_part_of_the_key() {
        let generator = DefaultFingerprint::default();
        let context = ExecutionContext::anonymous();
        let function = BuilderRef::function("Page::render", ()).unwrap();
        let method = BuilderRef::method("Page", "render", ()).unwrap();
        assert_ne!(
            generator.fingerprint(&function, &context),
            generator.fingerprint(&method, &context),
        );
    }
}
