//! Single-flight, key independence, and failure propagation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use permtree::testing::CountingBuilder;
use permtree::{CacheManager, Error};

use crate::common::{key, quiet_config};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_cold_reads_trigger_exactly_one_build() {
    let builder = CountingBuilder::with_delay(Duration::from_millis(60));
    let manager = CacheManager::start(quiet_config(), builder.clone());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move { manager.get_for(key(1)).await }));
    }

    let mut trees = Vec::new();
    for handle in handles {
        trees.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(builder.build_count(key(1)), 1);
    // Every caller observed the same outcome, not just an equal one.
    for tree in &trees[1..] {
        assert!(Arc::ptr_eq(&trees[0], tree));
    }
    manager.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_failing_flight_fails_all_its_callers_then_clears() {
    let builder = CountingBuilder::with_delay(Duration::from_millis(40));
    builder.fail_for(key(1));
    let manager = CacheManager::start(quiet_config(), builder.clone());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move { manager.get_for(key(1)).await }));
    }
    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(err.is_build_failed());
    }
    // One shared attempt, nothing cached.
    assert_eq!(builder.build_count(key(1)), 1);
    assert!(manager.try_get_for(key(1), false).is_none());

    // The slot is clear: the next call retries fresh and succeeds.
    builder.succeed_for(key(1));
    manager.get_for(key(1)).await.unwrap();
    assert_eq!(builder.build_count(key(1)), 2);
    manager.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn builds_for_different_tenants_are_independent() {
    let builder = CountingBuilder::new();
    builder.delay_for(key(2), Duration::from_millis(300));
    builder.fail_for(key(2));
    let manager = CacheManager::start(quiet_config(), builder.clone());

    let slow = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.get_for(key(2)).await })
    };

    // Tenant 1 completes quickly while tenant 2 is stuck building.
    let started = Instant::now();
    manager.get_for(key(1)).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(200));

    // Tenant 2's failure does not disturb tenant 1's entry.
    assert!(slow.await.unwrap().unwrap_err().is_build_failed());
    assert!(manager.try_get_for(key(1), false).is_some());
    manager.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invalidation_wins_a_race_with_an_in_flight_build() {
    let builder = CountingBuilder::with_delay(Duration::from_millis(100));
    let manager = CacheManager::start(quiet_config(), builder.clone());

    let pending = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.get_for(key(1)).await })
    };

    // Let the build get going, then invalidate underneath it.
    tokio::time::sleep(Duration::from_millis(30)).await;
    manager.drop_for(key(1));

    // The blocked caller still receives its tree and may keep using it.
    let tree = pending.await.unwrap().unwrap();
    assert_eq!(tree.key(), key(1));

    // But the cache did not resurrect the known-stale result.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(manager.try_get_for(key(1), false).is_none());
    assert_eq!(manager.resident_count(), 0);
    manager.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn try_get_for_returns_immediately_and_warms_in_background() {
    let builder = CountingBuilder::with_delay(Duration::from_millis(80));
    let manager = CacheManager::start(quiet_config(), builder.clone());

    let started = Instant::now();
    assert!(manager.try_get_for(key(1), true).is_none());
    // Bounded by a small constant, not by the build duration.
    assert!(started.elapsed() < Duration::from_millis(40));

    // The fire-and-forget build lands for a future call.
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if let Some(tree) = manager.try_get_for(key(1), false) {
            assert_eq!(tree.key(), key(1));
            break;
        }
        assert!(Instant::now() < deadline, "background build never completed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(builder.build_count(key(1)), 1);
    manager.stop();
}

#[tokio::test]
async fn try_get_for_without_trigger_never_builds() {
    let builder = CountingBuilder::new();
    let manager = CacheManager::start(quiet_config(), builder.clone());

    assert!(manager.try_get_for(key(1), false).is_none());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(builder.total_builds(), 0);
    manager.stop();
}

#[tokio::test]
async fn build_timeout_composes_at_the_call_site() {
    let builder = CountingBuilder::with_delay(Duration::from_secs(30));
    let manager = CacheManager::start(quiet_config(), builder);

    // The cache imposes no internal deadline; the caller brings one.
    let result =
        tokio::time::timeout(Duration::from_millis(50), manager.get_for(key(1))).await;
    assert!(result.is_err());
    manager.stop();
}

#[tokio::test]
async fn disabled_feature_reports_disabled_not_absent() {
    let builder = CountingBuilder::new();
    let config = permtree::CacheConfig::builder()
        .enabled(false)
        .janitor_period(Duration::from_secs(3600))
        .build();
    let manager = CacheManager::start(config, builder.clone());

    assert_eq!(manager.get_for(key(1)).await.unwrap_err(), Error::Disabled);
    assert!(manager.try_get_for(key(1), true).is_none());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(builder.total_builds(), 0);
    manager.stop();
}
