//! Coordinator, worker and the in-memory collaborators wired together.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lazybox::{
    AmbientContext, BuildRequest, BuilderRef, CacheEntry, ContextProvider, Coordinator,
    ExecutionContext, Outcome, Policy, Raw, Refresh, builder_fn,
};
use lazybox_backend::CacheStore;
use lazybox_memory::{MemoryLock, MemoryQueue, MokaStore, QueueRuntime};
use pretty_assertions::assert_eq;

struct App {
    store: Arc<MokaStore>,
    ambient: AmbientContext,
    coordinator: Coordinator,
    runtime: QueueRuntime,
}

fn app() -> App {
    let store = Arc::new(MokaStore::builder(1_000).build());
    let (queue, receiver) = MemoryQueue::channel(64);
    let coordinator = Coordinator::builder()
        .store(store.clone())
        .lock(Arc::new(MemoryLock::new()))
        .queue(Arc::new(queue))
        .build()
        .unwrap();

    let ambient = AmbientContext::new(ExecutionContext::anonymous());
    let seen = ambient.clone();
    coordinator.registry().register_method(
        "Greeting",
        "render",
        builder_fn(move |args| {
            let user = seen.current().user_id;
            async move {
                let word = args[0].as_str().unwrap_or("hello").to_owned();
                Ok(Raw::from(format!("{word}, user {user}")))
            }
        }),
    );

    let runtime =
        QueueRuntime::builder(receiver, coordinator.worker(Arc::new(ambient.clone()))).spawn();

    App {
        store,
        ambient,
        coordinator,
        runtime,
    }
}

fn request() -> BuildRequest {
    BuildRequest::new(
        BuilderRef::method("Greeting", "render", ("hi",)).unwrap(),
        ExecutionContext::new(42, 1),
    )
}

#[tokio::test]
async fn stale_content_is_refreshed_by_the_worker() {
    let app = app();
    let req = request();
    let fingerprint = app.coordinator.fingerprint(&req);
    let now = Utc::now();
    let stale = CacheEntry::new(
        Raw::from("hi, user 42 (old)"),
        now,
        Some(now + chrono::Duration::seconds(30)),
    );
    app.store.set(&fingerprint, stale).await.unwrap();

    let first = app.coordinator.build(&req, Policy::MISS).await.unwrap();
    assert_eq!(
        first,
        Outcome::Stale {
            data: Raw::from("hi, user 42 (old)"),
            refresh: Refresh::Enqueued,
        }
    );

    let stats = app.runtime.shutdown().await.unwrap();
    assert_eq!(stats.completed, 1);

    let second = app.coordinator.build(&req, Policy::MISS).await.unwrap();
    assert_eq!(second, Outcome::Hit(Raw::from("hi, user 42")));
    assert_eq!(app.ambient.current(), ExecutionContext::anonymous());
}

#[tokio::test]
async fn placeholder_until_the_deferred_build_lands() {
    let app = app();
    let req = request();

    let first = app.coordinator.build(&req, Policy::STATIC).await.unwrap();
    assert_eq!(first.status(), "placeholder");
    assert_eq!(first.refresh(), Some(Refresh::Enqueued));

    app.runtime.shutdown().await.unwrap();

    let second = app.coordinator.build(&req, Policy::STATIC).await.unwrap();
    assert_eq!(second, Outcome::Hit(Raw::from("hi, user 42")));
}

#[tokio::test]
async fn inline_build_is_cached() {
    let app = app();
    let req = request();

    let first = app.coordinator.build(&req, Policy::MISS).await.unwrap();
    // Inline builds run under the caller's ambient identity, not the request's.
    assert_eq!(first, Outcome::Built(Raw::from("hi, user 0")));

    let second = app.coordinator.build(&req, Policy::FRESH).await.unwrap();
    assert_eq!(second, Outcome::Hit(Raw::from("hi, user 0")));

    let entry = app
        .store
        .get(&app.coordinator.fingerprint(&req))
        .await
        .unwrap()
        .unwrap();
    let ttl = entry.ttl_at(Utc::now()).unwrap();
    assert!(ttl > Duration::from_secs(3590) && ttl <= Duration::from_secs(3600));

    let stats = app.runtime.shutdown().await.unwrap();
    assert_eq!(stats.completed, 0);
}
