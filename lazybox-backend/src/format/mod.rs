//! Wire formats for rebuild jobs.
//!
//! Queues that cross a process boundary carry jobs as bytes. A [`JobFormat`]
//! turns a [`RebuildJob`] into bytes and back.
//!
//! | Format | Readable | Use Case |
//! |--------|----------|----------|
//! | [`JsonFormat`] | Yes | Default, interoperable with non-Rust brokers |
//! | [`RonFormat`] | Yes | Debugging |

use lazybox_core::{Raw, RebuildJob};
use thiserror::Error;

mod json;
mod ron;

pub use json::JsonFormat;
pub use ron::RonFormat;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error(transparent)]
    Serialize(Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Deserialize(Box<dyn std::error::Error + Send + Sync>),
}

/// Encodes and decodes rebuild jobs.
pub trait JobFormat: Send + Sync + std::fmt::Debug {
    fn encode(&self, job: &RebuildJob) -> Result<Raw, FormatError>;

    fn decode(&self, data: &[u8]) -> Result<RebuildJob, FormatError>;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use lazybox_core::{BuilderRef, ExecutionContext, Fingerprint};

    use super::*;

    fn job() -> RebuildJob {
        RebuildJob {
            fingerprint: Fingerprint::from("function|news|[\"a|b\"]|1|2"),
            builder: BuilderRef::function("news", ("a|b",)).unwrap(),
            context: ExecutionContext::new(2, 1).with_path("news"),
            ttl: Duration::from_secs(60),
            minimum_ttl: Duration::from_secs(10),
            grace: Duration::from_secs(30),
            enqueued_at: Utc::now(),
        }
    }

    #[test]
    fn formats_agree_on_content() {
        let job = job();
        let formats: [&dyn JobFormat; 2] = [&JsonFormat, &RonFormat];
        for format in formats {
            let bytes = format.encode(&job).unwrap();
            assert_eq!(format.decode(&bytes).unwrap(), job, "{format:?}");
        }
    }

    #[test]
    fn decode_errors_are_reported() {
        assert!(matches!(
            JsonFormat.decode(b"{"),
            Err(FormatError::Deserialize(_))
        ));
        assert!(matches!(
            RonFormat.decode(&[0xff, 0xfe]),
            Err(FormatError::Deserialize(_))
        ));
    }
}
