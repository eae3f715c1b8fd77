use lazybox_core::Raw;

/// What happened to the refresh of stale or missing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Refresh {
    /// This call enqueued a rebuild.
    Enqueued,
    /// Another caller holds the lock and takes care of it.
    Busy,
    /// This call held the lock but could not schedule the rebuild.
    Failed,
}

/// Result of one coordinator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Fresh cached content.
    Hit(Raw),
    /// Stale cached content, served while a refresh happens elsewhere.
    Stale {
        /// The cached content.
        data: Raw,
        /// Fate of the refresh.
        refresh: Refresh,
    },
    /// Content built inline by this call and written to the cache.
    Built(Raw),
    /// Nothing cached yet; the configured placeholder is returned instead.
    Placeholder {
        /// The placeholder.
        data: Raw,
        /// Fate of the deferred build.
        refresh: Refresh,
    },
    /// Content built without touching the cache.
    Live(Raw),
    /// Every pass found the content missing and its lock taken.
    ///
    /// A hard miss caused by contention, not by a builder defect.
    Exhausted {
        /// Cache reads performed.
        passes: u8,
    },
}

impl Outcome {
    /// Returns the status token, as exposed in debug headers.
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Hit(_) => "hit",
            Outcome::Stale {
                refresh: Refresh::Enqueued,
                ..
            } => "stale-refresh",
            Outcome::Stale {
                refresh: Refresh::Busy,
                ..
            } => "stale-busy",
            Outcome::Stale {
                refresh: Refresh::Failed,
                ..
            } => "stale-failed",
            Outcome::Built(_) => "built",
            Outcome::Placeholder { .. } => "placeholder",
            Outcome::Live(_) => "live",
            Outcome::Exhausted { .. } => "exhausted",
        }
    }

    /// Returns the content to serve, if any.
    pub fn data(&self) -> Option<&Raw> {
        match self {
            Outcome::Hit(data)
            | Outcome::Built(data)
            | Outcome::Live(data)
            | Outcome::Stale { data, .. }
            | Outcome::Placeholder { data, .. } => Some(data),
            Outcome::Exhausted { .. } => None,
        }
    }

    /// Consumes the outcome and returns the content to serve, if any.
    pub fn into_data(self) -> Option<Raw> {
        match self {
            Outcome::Hit(data)
            | Outcome::Built(data)
            | Outcome::Live(data)
            | Outcome::Stale { data, .. }
            | Outcome::Placeholder { data, .. } => Some(data),
            Outcome::Exhausted { .. } => None,
        }
    }

    /// Returns the refresh status for stale and placeholder outcomes.
    pub fn refresh(&self) -> Option<Refresh> {
        match self {
            Outcome::Stale { refresh, .. } | Outcome::Placeholder { refresh, .. } => Some(*refresh),
            _ => None,
        }
    }

    /// Returns `true` if the call gave up on contention.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Outcome::Exhausted { .. })
    }
}
