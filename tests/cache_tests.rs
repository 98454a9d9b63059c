//! Typed cache store integration tests
//!
//! Exercises the public cache surface the way the authorization layer uses
//! it: typed round trips, TTL expiry, per-policy eviction under a custom
//! configuration, prefix invalidation, and statistics.

use authgate::{cache_types, AuthzConfig, CacheStore, CacheTypeConfig, EvictionPolicy};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn tiny_config() -> AuthzConfig {
    let mut config = AuthzConfig::default();
    config.caches = HashMap::from([
        (
            "recent".to_string(),
            CacheTypeConfig {
                prefix: "r".to_string(),
                ttl_secs: 60,
                max_entries: 2,
                eviction: EvictionPolicy::Recency,
                sweep_secs: 1,
            },
        ),
        (
            "frequent".to_string(),
            CacheTypeConfig {
                prefix: "f".to_string(),
                ttl_secs: 60,
                max_entries: 2,
                eviction: EvictionPolicy::Frequency,
                sweep_secs: 1,
            },
        ),
        (
            "ordered".to_string(),
            CacheTypeConfig {
                prefix: "o".to_string(),
                ttl_secs: 60,
                max_entries: 2,
                eviction: EvictionPolicy::InsertionOrder,
                sweep_secs: 1,
            },
        ),
        (
            cache_types::DEFAULT.to_string(),
            CacheTypeConfig {
                prefix: "gen".to_string(),
                ttl_secs: 0,
                max_entries: 16,
                eviction: EvictionPolicy::Recency,
                sweep_secs: 1,
            },
        ),
    ]);
    config
}

#[tokio::test]
async fn round_trip_then_expiry() {
    let store = CacheStore::new(&AuthzConfig::default());

    store.set(
        cache_types::USERS,
        "alice",
        json!("admin"),
        Some(Duration::from_millis(50)),
    );
    assert_eq!(store.get(cache_types::USERS, "alice"), Some(json!("admin")));
    assert!(store.ttl_remaining(cache_types::USERS, "alice").is_some());

    sleep(Duration::from_millis(100)).await;

    assert!(store.get(cache_types::USERS, "alice").is_none());
    assert!(store.ttl_remaining(cache_types::USERS, "alice").is_none());
}

#[tokio::test]
async fn each_policy_picks_its_own_victim() {
    let store = CacheStore::new(&tiny_config());

    // Recency: touching "a" makes "b" the victim
    store.set("recent", "a", json!(1), None);
    store.set("recent", "b", json!(2), None);
    store.get("recent", "a");
    store.set("recent", "c", json!(3), None);
    assert!(store.has("recent", "a"));
    assert!(!store.has("recent", "b"));

    // Frequency: the entry with fewer hits goes first
    store.set("frequent", "hot", json!(1), None);
    store.set("frequent", "cold", json!(2), None);
    store.get("frequent", "hot");
    store.get("frequent", "hot");
    store.set("frequent", "new", json!(3), None);
    assert!(store.has("frequent", "hot"));
    assert!(!store.has("frequent", "cold"));

    // Insertion order: oldest goes first no matter how hot it is
    store.set("ordered", "first", json!(1), None);
    store.set("ordered", "second", json!(2), None);
    store.get("ordered", "first");
    store.get("ordered", "first");
    store.set("ordered", "third", json!(3), None);
    assert!(!store.has("ordered", "first"));
    assert!(store.has("ordered", "second"));
}

#[tokio::test]
async fn prefix_deletion_matches_user_scoped_keys() {
    let store = CacheStore::new(&AuthzConfig::default());

    store.set(cache_types::PERMISSIONS, "alice:users.edit", json!(true), None);
    store.set(cache_types::PERMISSIONS, "alice:users.view", json!(true), None);
    store.set(cache_types::PERMISSIONS, "alicia:users.edit", json!(true), None);
    store.set(cache_types::SECTIONS, "alice:reports:view", json!(true), None);

    // "alice:" must not catch "alicia:"
    assert_eq!(store.delete_prefix(cache_types::PERMISSIONS, "alice:"), 2);
    assert!(store.has(cache_types::PERMISSIONS, "alicia:users.edit"));
    assert!(store.has(cache_types::SECTIONS, "alice:reports:view"));
}

#[tokio::test]
async fn sweeper_removes_expired_entries_in_the_background() {
    let store = Arc::new(CacheStore::new(&tiny_config()));

    store.set("recent", "gone", json!(1), Some(Duration::from_millis(50)));
    store.set("recent", "kept", json!(2), None);

    store.spawn_sweepers();
    sleep(Duration::from_millis(1_300)).await;

    // Removed by the sweep task, not by a get
    assert_eq!(store.stats("recent").unwrap().keys, 1);
    assert!(store.has("recent", "kept"));

    store.shutdown();
}

#[tokio::test]
async fn stats_track_hits_misses_and_rate() {
    let store = CacheStore::new(&AuthzConfig::default());

    store.set(cache_types::SETTINGS, "theme", json!("dark"), None);
    assert!(store.get(cache_types::SETTINGS, "theme").is_some());
    assert!(store.get(cache_types::SETTINGS, "theme").is_some());
    assert!(store.get(cache_types::SETTINGS, "missing").is_none());

    let stats = store.stats(cache_types::SETTINGS).unwrap();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.keys, 1);

    let aggregated = store.aggregate_stats();
    assert!(aggregated.total.hits >= 2);
    assert!(aggregated.per_type.contains_key(cache_types::SETTINGS));
    assert!(aggregated.total.hit_rate() > 0.5);
}
