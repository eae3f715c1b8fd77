//! Coordinator configuration.
//!
//! All durations are written in humantime notation (`"1h"`, `"5m"`, `"30s"`)
//! when (de)serialized.
//!
//! ```
//! use lazybox::config::CoordinatorConfig;
//! use std::time::Duration;
//!
//! let yaml = r#"
//! ttl: 10m
//! minimum_ttl: 1m
//! grace: 2m
//! max_passes: 3
//! "#;
//! let config = CoordinatorConfig::from_yaml(yaml).unwrap();
//! assert_eq!(config.ttl, Duration::from_secs(600));
//! assert_eq!(config.max_passes.get(), 3);
//! // Unset fields keep their defaults.
//! assert_eq!(config.lock_timeout, Duration::from_secs(5));
//! ```

use std::time::Duration;

use bounded_integer::bounded_integer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

bounded_integer! {
    /// Number of cache reads a coordinator call makes before giving up (1-255).
    #[repr(u8)]
    pub struct MaxPasses { 1..=255 }
}

const DEFAULT_MAX_PASSES: u8 = 5;

/// Placeholder served by the static policy while content is being built.
pub const DEFAULT_PLACEHOLDER: &str = "Content is being updated, please wait for a few seconds.";

fn default_max_passes() -> MaxPasses {
    MaxPasses::new(DEFAULT_MAX_PASSES).unwrap_or(MaxPasses::MIN)
}

/// Invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML document could not be parsed.
    #[error("invalid configuration document: {0}")]
    Parse(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Content would expire as soon as it is written.
    #[error("ttl must be positive")]
    ZeroTtl,

    /// A lock that expires immediately excludes nobody.
    #[error("lock timeout must be positive")]
    ZeroLockTimeout,

    /// Fresh content would already be stale.
    #[error("minimum ttl ({minimum_ttl:?}) must be shorter than ttl ({ttl:?})")]
    MinimumTtlNotBelowTtl {
        /// Configured staleness margin.
        minimum_ttl: Duration,
        /// Configured content lifetime.
        ttl: Duration,
    },

    /// Stale entries would be refreshed again by every request.
    #[error("grace must be positive")]
    ZeroGrace,

    /// An extended entry would still be stale, so every request would
    /// enqueue another refresh.
    #[error("grace ({grace:?}) must be longer than minimum ttl ({minimum_ttl:?})")]
    GraceNotAboveMinimumTtl {
        /// Configured expiry extension.
        grace: Duration,
        /// Configured staleness margin.
        minimum_ttl: Duration,
    },
}

/// Timing parameters shared by a coordinator and the jobs it enqueues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Lifetime of freshly built content.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Content is stale once less than this is left before it expires.
    #[serde(with = "humantime_serde")]
    pub minimum_ttl: Duration,
    /// Added to the expiry of stale content when its refresh is enqueued.
    #[serde(with = "humantime_serde")]
    pub grace: Duration,
    /// Lifetime of a rebuild lock.
    #[serde(with = "humantime_serde")]
    pub lock_timeout: Duration,
    /// Cache reads before a call gives up on contention.
    pub max_passes: MaxPasses,
    /// Upper bound on one builder run. `None` lets builders run forever.
    #[serde(with = "humantime_serde")]
    pub build_timeout: Option<Duration>,
    /// Content returned on a miss under the static policy.
    pub placeholder: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            ttl: Duration::from_secs(3600),
            minimum_ttl: Duration::from_secs(300),
            grace: Duration::from_secs(3600),
            lock_timeout: Duration::from_secs(5),
            max_passes: default_max_passes(),
            build_timeout: Some(Duration::from_secs(30)),
            placeholder: DEFAULT_PLACEHOLDER.to_owned(),
        }
    }
}

impl CoordinatorConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::default()
    }

    /// Parses a YAML document. Missing fields keep their defaults.
    ///
    /// The result is validated.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: CoordinatorConfig =
            serde_saphyr::from_str(yaml).map_err(|error| ConfigError::Parse(Box::new(error)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the relations between timing parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }
        if self.lock_timeout.is_zero() {
            return Err(ConfigError::ZeroLockTimeout);
        }
        if self.minimum_ttl >= self.ttl {
            return Err(ConfigError::MinimumTtlNotBelowTtl {
                minimum_ttl: self.minimum_ttl,
                ttl: self.ttl,
            });
        }
        if self.grace.is_zero() {
            return Err(ConfigError::ZeroGrace);
        }
        if self.grace <= self.minimum_ttl {
            return Err(ConfigError::GraceNotAboveMinimumTtl {
                grace: self.grace,
                minimum_ttl: self.minimum_ttl,
            });
        }
        Ok(())
    }
}

/// Builder for [`CoordinatorConfig`].
///
/// ```
/// use lazybox::config::{CoordinatorConfig, MaxPasses};
/// use std::time::Duration;
///
/// let config = CoordinatorConfig::builder()
///     .ttl(Duration::from_secs(600))
///     .minimum_ttl(Duration::from_secs(60))
///     .max_passes(MaxPasses::new(3).unwrap())
///     .build()
///     .unwrap();
/// assert_eq!(config.grace, Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfigBuilder {
    config: CoordinatorConfig,
}

impl CoordinatorConfigBuilder {
    /// Sets the lifetime of freshly built content.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Sets the staleness margin.
    pub fn minimum_ttl(mut self, minimum_ttl: Duration) -> Self {
        self.config.minimum_ttl = minimum_ttl;
        self
    }

    /// Sets the expiry extension granted to stale content being refreshed.
    pub fn grace(mut self, grace: Duration) -> Self {
        self.config.grace = grace;
        self
    }

    /// Sets the lifetime of rebuild locks.
    pub fn lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.config.lock_timeout = lock_timeout;
        self
    }

    /// Sets the number of cache reads before giving up.
    pub fn max_passes(mut self, max_passes: MaxPasses) -> Self {
        self.config.max_passes = max_passes;
        self
    }

    /// Sets or clears the builder run limit.
    pub fn build_timeout(mut self, build_timeout: Option<Duration>) -> Self {
        self.config.build_timeout = build_timeout;
        self
    }

    /// Sets the static policy placeholder.
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.config.placeholder = placeholder.into();
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<CoordinatorConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
