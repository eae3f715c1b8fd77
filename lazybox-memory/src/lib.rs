#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod lock;
pub mod metrics;
mod queue;
mod store;

pub use lock::MemoryLock;
pub use queue::{MemoryQueue, QueueReceiver, QueueRuntime, QueueRuntimeBuilder, QueueStats};
pub use store::{MokaStore, MokaStoreBuilder};
