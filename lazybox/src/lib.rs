#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Timing configuration.
///
/// Defines [`CoordinatorConfig`](config::CoordinatorConfig) with:
/// - **TTL** - lifetime of freshly built content
/// - **Minimum TTL** - the margin before expiry at which content turns stale
/// - **Grace** - the extension granted to stale content while it is refreshed
/// - **Lock timeout** and **max passes** - how long and how often to contend
pub mod config;

/// The cache-fill state machine.
///
/// [`Coordinator`](coordinator::Coordinator) decides per request whether to
/// serve cached content, serve stale content while scheduling a refresh,
/// wait for a rebuild in flight, or build inline.
pub mod coordinator;

mod error;

/// Scoped identity substitution for deferred rebuilds.
pub mod masquerade;

/// Metrics collection.
///
/// When the `metrics` feature is enabled, this module provides counters
/// and histograms for:
/// - Coordinator calls per outcome status and policy
/// - Waits on contended rebuild locks
/// - Enqueued and completed deferred rebuilds
pub mod metrics;

mod registry;
mod worker;

pub use config::{ConfigError, CoordinatorConfig, CoordinatorConfigBuilder, MaxPasses};
pub use coordinator::{BuildRequest, Coordinator, CoordinatorBuilder, NotSet, Outcome, Refresh};
pub use error::CoordinatorError;
pub use masquerade::{Masquerade, MasqueradeError};
pub use registry::BuilderRegistry;
pub use worker::RebuildWorker;

pub use lazybox_core::{
    AmbientContext, AuthorizationTier, BuildError, Builder, BuilderKind, BuilderRef,
    CacheEntry, ContextProvider, DefaultFingerprint, ExecutionContext, Fingerprint,
    FingerprintGenerator, Policy, Raw, RebuildJob, builder_fn,
};
