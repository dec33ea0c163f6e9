//! Janitor behavior through the public surface: trim independence from
//! eviction, and per-tenant failure isolation.

use std::time::Duration;

use permtree::CacheManager;
use permtree::testing::CountingBuilder;

use crate::common::{fast_config, key};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hot_entries_are_trimmed_without_being_evicted() {
    let builder = CountingBuilder::new();
    let manager = CacheManager::start(
        fast_config(Duration::from_millis(300), Duration::from_millis(50)),
        builder.clone(),
    );

    let tree = manager.get_for(key(1)).await.unwrap();

    // Touch the entry every 60ms, always inside the TTL window, across
    // several janitor periods.
    for _ in 0..6 {
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(manager.try_get_for(key(1), false).is_some());
    }

    // Never evicted, yet trimmed repeatedly while resident.
    assert_eq!(builder.build_count(key(1)), 1);
    assert!(tree.trim_count() >= 3, "expected repeated trims, saw {}", tree.trim_count());

    // Cutoffs trail the wall clock by the TTL window.
    let now = std::time::Instant::now();
    for cutoff in tree.trim_cutoffs() {
        assert!(cutoff <= now);
    }
    manager.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_tenants_trim_panic_does_not_starve_the_others() {
    let builder = CountingBuilder::new();
    let manager = CacheManager::start(
        fast_config(Duration::from_secs(60), Duration::from_millis(40)),
        builder.clone(),
    );

    let poisoned = manager.get_for(key(1)).await.unwrap();
    let healthy = manager.get_for(key(2)).await.unwrap();
    poisoned.panic_on_trim();

    tokio::time::sleep(Duration::from_millis(180)).await;

    // The healthy tenant keeps getting trimmed across periods, which also
    // proves the schedule survived the panics.
    assert!(healthy.trim_count() >= 2, "janitor schedule died, saw {}", healthy.trim_count());
    assert_eq!(poisoned.trim_count(), 0);
    assert_eq!(manager.resident_count(), 2);
    manager.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stopping_the_manager_stops_the_schedule() {
    let builder = CountingBuilder::new();
    let manager = CacheManager::start(
        fast_config(Duration::from_secs(60), Duration::from_millis(30)),
        builder,
    );

    let tree = manager.get_for(key(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(tree.trim_count() >= 1);

    manager.stop();
    tokio::time::sleep(Duration::from_millis(40)).await;
    let after_stop = tree.trim_count();
    tokio::time::sleep(Duration::from_millis(90)).await;
    assert_eq!(tree.trim_count(), after_stop);
}
