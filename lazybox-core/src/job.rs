//! Deferred rebuild jobs.
//!
//! A [`RebuildJob`] is everything a queue worker needs to redo a build outside
//! the request that asked for it: where to store the result, which builder to
//! run with which arguments, on behalf of whom, and for how long the result
//! stays valid. It is plain data and serializes to JSON; live callables never
//! cross the queue boundary.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::BuilderRef;
use crate::context::ExecutionContext;
use crate::fingerprint::Fingerprint;

/// Error raised while describing deferred work.
#[derive(Debug, Error)]
pub enum JobError {
    /// Builder arguments (or the job itself) have no serialized form.
    #[error("job is not serializable: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A builder identifier is empty or contains the reserved separator.
    #[error("invalid builder identifier {0:?}")]
    InvalidIdentifier(String),
}

/// A serializable description of a deferred rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildJob {
    /// Key under which the rebuilt content is stored.
    pub fingerprint: Fingerprint,
    /// Builder to run.
    pub builder: BuilderRef,
    /// Identity to masquerade as while building.
    pub context: ExecutionContext,
    /// Lifetime of the rebuilt content.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Staleness margin the enqueuing coordinator used.
    #[serde(with = "humantime_serde")]
    pub minimum_ttl: Duration,
    /// Grace the enqueuing coordinator added to the stale entry.
    #[serde(with = "humantime_serde")]
    pub grace: Duration,
    /// When the job was created.
    pub enqueued_at: DateTime<Utc>,
}
