// #![warn(missing_docs)]
//! Traits for lazybox collaborator interaction.
//!
//! The coordinator never talks to a storage engine, a lock server or a job
//! broker directly. It goes through the three narrow contracts defined here:
//!
//! - [`CacheStore`] - read and write [`CacheEntry`](lazybox_core::CacheEntry) values
//! - [`LockService`] - named, TTL-bounded single-flight locks
//! - [`JobQueue`] / [`JobHandler`] - producer and consumer sides of the deferred queue
//!
//! If you want to plug in your own cache, lock or queue, you are in the right place.
mod error;
pub mod format;
mod lock;
mod queue;
mod store;

pub use error::{BackendError, BackendResult};
pub use format::{FormatError, JobFormat, JsonFormat, RonFormat};
pub use lock::{LockName, LockService, LockStatus, LockToken};
pub use queue::{HandlerError, JobHandler, JobQueue};
pub use store::CacheStore;
