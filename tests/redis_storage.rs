//! Integration tests for Redis storage.
//!
//! These tests require a Redis instance running at `redis://127.0.0.1/`.
//! Tests are ignored by default - run with `cargo test --features redis-storage --test redis_storage -- --ignored`

#![cfg(feature = "redis-storage")]

use license_gate::application::ports::{Storage, WindowStorage};
use license_gate::infrastructure::mocks::MockClock;
use license_gate::{
    RateLimitBackend, RateLimitConfig, RateLimiter, RedisStorage, RedisStorageConfig,
    RequestWindow,
};
use std::sync::Arc;
use std::time::Duration;

/// Check if Redis is available before running tests
async fn redis_available() -> bool {
    RedisStorage::connect("redis://127.0.0.1/").await.is_ok()
}

/// Create a test storage with unique prefix
async fn create_test_storage(test_name: &str) -> RedisStorage {
    let config = RedisStorageConfig {
        key_prefix: format!("test:{}:", test_name),
        ttl: Duration::from_secs(60),
    };

    RedisStorage::connect_with_config("redis://127.0.0.1/", config)
        .await
        .expect("Failed to connect to Redis")
}

#[tokio::test(flavor = "multi_thread")]
#[ignore] // Requires Redis
async fn test_redis_window_round_trip() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available at redis://127.0.0.1/");
        return;
    }

    let storage = create_test_storage("round_trip").await;
    storage.clear().unwrap();

    for now in [100, 110, 120] {
        storage
            .with_entry_mut("10.0.0.1".to_string(), RequestWindow::new, |w| {
                w.admit(now, 5, 60)
            })
            .unwrap();
    }

    let stored = storage
        .with_entry_mut("10.0.0.1".to_string(), RequestWindow::new, |w| {
            w.timestamps().collect::<Vec<_>>()
        })
        .unwrap();
    assert_eq!(stored, vec![100, 110, 120]);
    assert_eq!(storage.len().unwrap(), 1);

    storage.clear().unwrap();
    assert!(storage.is_empty().unwrap());
}

#[tokio::test(flavor = "multi_thread")]
#[ignore] // Requires Redis
async fn test_redis_retain_drops_idle_windows() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available");
        return;
    }

    let storage = create_test_storage("retain").await;
    storage.clear().unwrap();

    storage
        .with_entry_mut("idle".to_string(), RequestWindow::new, |w| w.admit(0, 5, 60))
        .unwrap();
    storage
        .with_entry_mut("busy".to_string(), RequestWindow::new, |w| w.admit(100, 5, 60))
        .unwrap();

    storage
        .retain(|_, window| {
            window.prune(100, 60);
            !window.is_empty()
        })
        .unwrap();

    assert_eq!(storage.len().unwrap(), 1);
    storage.clear().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore] // Requires Redis
async fn test_redis_instances_share_limits() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available");
        return;
    }

    let first = create_test_storage("shared").await;
    let second = create_test_storage("shared").await;
    first.clear().unwrap();

    let clock = MockClock::at_unix(1_700_000_000);
    let config = RateLimitConfig::new(2, 60);
    let a = RateLimiter::new(RateLimitBackend::Redis(first.clone()), Arc::new(clock.clone()), config);
    let b = RateLimiter::new(RateLimitBackend::Redis(second), Arc::new(clock.clone()), config);

    assert!(a.admit("10.0.0.9").is_admit());
    assert!(b.admit("10.0.0.9").is_admit());
    assert!(a.admit("10.0.0.9").is_reject());
    assert!(b.admit("10.0.0.9").is_reject());

    clock.advance(Duration::from_secs(60));
    assert!(b.admit("10.0.0.9").is_admit());

    first.clear().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore] // Requires Redis
async fn test_redis_admit_window_shares_state_with_entry_access() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available");
        return;
    }

    let storage = create_test_storage("admit_window").await;
    storage.clear().unwrap();

    assert!(storage.admit_window("10.0.0.2", 100, 2, 60).unwrap().is_admit());
    assert!(storage.admit_window("10.0.0.2", 110, 2, 60).unwrap().is_admit());
    assert!(storage.admit_window("10.0.0.2", 120, 2, 60).unwrap().is_reject());

    let stored = storage
        .with_entry_mut("10.0.0.2".to_string(), RequestWindow::new, |w| {
            w.timestamps().collect::<Vec<_>>()
        })
        .unwrap();
    assert_eq!(stored, vec![100, 110]);

    // The oldest timestamp leaves the window at exactly 60 seconds
    assert!(storage.admit_window("10.0.0.2", 160, 2, 60).unwrap().is_admit());

    storage.clear().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore] // Requires Redis
async fn test_redis_concurrent_instances_never_overshoot_budget() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available");
        return;
    }

    let mut instances = Vec::new();
    for _ in 0..4 {
        instances.push(create_test_storage("contended").await);
    }
    instances[0].clear().unwrap();

    let handles: Vec<_> = instances
        .iter()
        .cloned()
        .map(|storage| {
            tokio::task::spawn_blocking(move || {
                (0..25)
                    .filter(|_| {
                        storage
                            .admit_window("10.0.0.3", 1_700_000_000, 10, 60)
                            .unwrap()
                            .is_admit()
                    })
                    .count()
            })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        admitted += handle.await.unwrap();
    }

    assert_eq!(admitted, 10);
    instances[0].clear().unwrap();
}
