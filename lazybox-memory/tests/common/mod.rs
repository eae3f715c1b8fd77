//! Shared fixtures for the in-memory backend tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use lazybox_backend::{HandlerError, JobHandler};
use lazybox_core::{BuilderRef, ExecutionContext, Fingerprint, RebuildJob};

pub fn job(name: &str) -> RebuildJob {
    RebuildJob {
        fingerprint: Fingerprint::from(format!("function|{name}|[]|0|0")),
        builder: BuilderRef::function(name, ()).unwrap(),
        context: ExecutionContext::new(4, 1),
        ttl: Duration::from_secs(3600),
        minimum_ttl: Duration::from_secs(300),
        grace: Duration::from_secs(3600),
        enqueued_at: Utc::now(),
    }
}

/// Handler recording every delivery and failing the first `failures` of them.
#[derive(Default)]
pub struct RecordingHandler {
    failures: AtomicU32,
    deliveries: Mutex<Vec<RebuildJob>>,
}

impl RecordingHandler {
    pub fn failing(failures: u32) -> Self {
        RecordingHandler {
            failures: AtomicU32::new(failures),
            deliveries: Mutex::default(),
        }
    }

    pub fn deliveries(&self) -> Vec<RebuildJob> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobHandler for RecordingHandler {
    async fn on_job(&self, job: RebuildJob) -> Result<(), HandlerError> {
        self.deliveries.lock().unwrap().push(job);
        let left = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match left {
            Ok(_) => Err("builder exploded".into()),
            Err(_) => Ok(()),
        }
    }
}
