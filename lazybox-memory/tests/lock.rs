use std::sync::Arc;
use std::time::Duration;

use lazybox_backend::{LockName, LockService, LockStatus};
use lazybox_core::Fingerprint;
use lazybox_memory::MemoryLock;
use tokio::time::Instant;

fn name(key: &str) -> LockName {
    LockName::new("lazybox.build", &Fingerprint::from(key))
}

#[tokio::test(start_paused = true)]
async fn only_one_holder_at_a_time() {
    let lock = MemoryLock::new();
    let name = name("front");

    let first = lock.try_acquire(&name, Duration::from_secs(5)).await.unwrap();
    let token = first.token().expect("first acquire wins");
    assert_eq!(
        lock.try_acquire(&name, Duration::from_secs(5)).await.unwrap(),
        LockStatus::Locked
    );

    lock.release(&name, token).await.unwrap();
    assert!(matches!(
        lock.try_acquire(&name, Duration::from_secs(5)).await.unwrap(),
        LockStatus::Acquired(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn different_names_do_not_contend() {
    let lock = MemoryLock::new();
    let ttl = Duration::from_secs(5);
    assert!(lock.try_acquire(&name("a"), ttl).await.unwrap().token().is_some());
    assert!(lock.try_acquire(&name("b"), ttl).await.unwrap().token().is_some());
    assert!(
        lock.try_acquire(&LockName::new("lazybox.defer", &Fingerprint::from("a")), ttl)
            .await
            .unwrap()
            .token()
            .is_some()
    );
}

#[tokio::test(start_paused = true)]
async fn stale_token_cannot_release_new_holder() {
    let lock = MemoryLock::new();
    let name = name("front");
    let ttl = Duration::from_secs(5);

    let old = lock.try_acquire(&name, ttl).await.unwrap().token().unwrap();
    tokio::time::advance(Duration::from_secs(6)).await;
    let new = lock.try_acquire(&name, ttl).await.unwrap().token().unwrap();
    assert_ne!(old, new);

    lock.release(&name, old).await.unwrap();
    assert!(lock.is_locked(&name));

    lock.release(&name, new).await.unwrap();
    lock.release(&name, new).await.unwrap();
    assert!(!lock.is_locked(&name));
}

#[tokio::test(start_paused = true)]
async fn expired_lock_is_taken_over() {
    let lock = MemoryLock::new();
    let name = name("front");
    lock.try_acquire(&name, Duration::from_secs(5)).await.unwrap();

    tokio::time::advance(Duration::from_secs(4)).await;
    assert_eq!(
        lock.try_acquire(&name, Duration::from_secs(5)).await.unwrap(),
        LockStatus::Locked
    );

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(matches!(
        lock.try_acquire(&name, Duration::from_secs(5)).await.unwrap(),
        LockStatus::Acquired(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn wait_on_free_lock_returns_at_once() {
    let lock = MemoryLock::new();
    let started = Instant::now();
    lock.wait(&name("front")).await.unwrap();
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn wait_wakes_on_release() {
    let lock = Arc::new(MemoryLock::new());
    let name = name("front");
    let token = lock
        .try_acquire(&name, Duration::from_secs(60))
        .await
        .unwrap()
        .token()
        .unwrap();

    let started = Instant::now();
    let waiter = tokio::spawn({
        let lock = lock.clone();
        let name = name.clone();
        async move { lock.wait(&name).await }
    });
    tokio::task::yield_now().await;

    tokio::time::advance(Duration::from_secs(1)).await;
    lock.release(&name, token).await.unwrap();
    waiter.await.unwrap().unwrap();

    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn wait_gives_up_when_holder_expires() {
    let lock = MemoryLock::new();
    let name = name("front");
    lock.try_acquire(&name, Duration::from_secs(5)).await.unwrap();

    let started = Instant::now();
    lock.wait(&name).await.unwrap();

    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(5) && waited < Duration::from_secs(6));
    assert!(!lock.is_locked(&name));
}
