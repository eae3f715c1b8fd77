//! Freshness policies.
//!
//! All policies share the same coordinator mechanics and differ in three
//! switches only:
//!
//! | Policy   | stale entry              | cache miss                    | cache |
//! |----------|--------------------------|-------------------------------|-------|
//! | `LIVE`   | n/a                      | n/a                           | bypassed, always builds |
//! | `FRESH`  | treated as a miss        | inline rebuild                | used |
//! | `MISS`   | served, refreshed async  | inline rebuild                | used |
//! | `STATIC` | served, refreshed async  | placeholder, rebuild deferred | used |

use serde::{Deserialize, Serialize};

/// Switches selecting coordinator behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Policy {
    /// Stale entries are rebuilt inline instead of served.
    pub stale_is_miss: bool,
    /// Misses return a placeholder and defer the build.
    pub placeholder_on_miss: bool,
    /// Skip cache, lock and queue entirely.
    pub bypass_cache: bool,
}

impl Policy {
    /// Always build, never cache.
    pub const LIVE: Policy = Policy {
        stale_is_miss: false,
        placeholder_on_miss: false,
        bypass_cache: true,
    };

    /// Serve fresh content only; rebuild stale content inline.
    pub const FRESH: Policy = Policy {
        stale_is_miss: true,
        placeholder_on_miss: false,
        bypass_cache: false,
    };

    /// Serve anything cached; build inline on misses only.
    pub const MISS: Policy = Policy {
        stale_is_miss: false,
        placeholder_on_miss: false,
        bypass_cache: false,
    };

    /// Never build inline.
    pub const STATIC: Policy = Policy {
        stale_is_miss: false,
        placeholder_on_miss: true,
        bypass_cache: false,
    };

    /// Resolves the policy granted to a caller.
    pub const fn for_tier(tier: AuthorizationTier) -> Policy {
        match tier {
            AuthorizationTier::FrontAlways => Policy::LIVE,
            AuthorizationTier::FrontOnExpired => Policy::FRESH,
            AuthorizationTier::FrontOnMiss => Policy::MISS,
            AuthorizationTier::None => Policy::STATIC,
        }
    }

    /// Returns the policy name for logs and metrics.
    pub const fn name(&self) -> &'static str {
        match (self.bypass_cache, self.stale_is_miss, self.placeholder_on_miss) {
            (true, _, _) => "live",
            (false, true, _) => "fresh",
            (false, false, false) => "miss",
            (false, false, true) => "static",
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy::MISS
    }
}

impl From<AuthorizationTier> for Policy {
    fn from(tier: AuthorizationTier) -> Self {
        Policy::for_tier(tier)
    }
}

/// How much front-end building a caller may trigger.
///
/// Ordered from most to least permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationTier {
    /// May always build in the front end, for people who need every change now.
    FrontAlways,
    /// May build in the front end when content is stale, e.g. editors.
    FrontOnExpired,
    /// May build in the front end on cache misses. The common choice.
    #[default]
    FrontOnMiss,
    /// May never build in the front end.
    None,
}
