#![warn(missing_docs)]
//! # lazybox-core
//!
//! Core value types for the lazybox cache-fill coordinator.
//!
//! This crate holds everything that crosses a boundary: the cache key
//! ([`Fingerprint`]), the cached payload ([`CacheEntry`]), the identity the
//! content is built for ([`ExecutionContext`]), and the serializable
//! description of deferred work ([`RebuildJob`]). It performs no I/O.
//!
//! ## Architecture
//!
//! The coordinator in the `lazybox` crate uses these types to:
//!
//! - **Key** content per builder, arguments and identity ([`FingerprintGenerator`])
//! - **Judge** staleness with a pre-emptive margin ([`CacheEntry::is_stale_at`])
//! - **Reference** builders by name rather than by closure ([`BuilderRef`])
//! - **Choose** a freshness policy per caller ([`Policy`])
//! - **Swap** the ambient identity for deferred work ([`ContextProvider`])

pub mod builder;
pub mod context;
pub mod entry;
pub mod fingerprint;
pub mod job;
pub mod policy;

pub use builder::{BuildError, Builder, BuilderFn, BuilderKind, BuilderRef, builder_fn};
pub use context::{AmbientContext, ContextProvider, ExecutionContext};
pub use entry::CacheEntry;
pub use fingerprint::{DefaultFingerprint, Fingerprint, FingerprintGenerator};
pub use job::{JobError, RebuildJob};
pub use policy::{AuthorizationTier, Policy};
#[doc(hidden)]
pub use smol_str::SmolStr;

/// Raw byte data type used for built and cached content.
/// Using `Bytes` provides efficient zero-copy cloning via reference counting.
pub type Raw = bytes::Bytes;

/// Separator reserved for fingerprint and lock name composition.
///
/// Builder identifiers may not contain it.
pub const SEPARATOR: char = '|';
