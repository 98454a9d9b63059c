//! Typed cache store
//!
//! A fixed registry of named cache instances, one per configured type
//! (`users`, `sections`, `permissions`, ...), plus a catch-all default that
//! absorbs lookups for undeclared types. The store also owns the
//! event→invalidation table: callers invoke [`CacheStore::purge_event`]
//! after a successful write; nothing here subscribes to events on its own.

pub mod typed;

pub use typed::{TypeStats, TypedCache};

use crate::config::{cache_types, AuthzConfig, InvalidationRule};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Registry of typed cache instances
pub struct CacheStore {
    caches: HashMap<String, Arc<TypedCache>>,
    default: Arc<TypedCache>,
    invalidation: HashMap<String, Vec<InvalidationRule>>,
    sweepers: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheStore {
    /// Build every declared cache type from configuration
    pub fn new(config: &AuthzConfig) -> Self {
        let mut caches: HashMap<String, Arc<TypedCache>> = config
            .caches
            .iter()
            .map(|(name, tuning)| (name.clone(), Arc::new(TypedCache::new(name, tuning))))
            .collect();

        let default = caches
            .entry(cache_types::DEFAULT.to_string())
            .or_insert_with(|| {
                Arc::new(TypedCache::new(
                    cache_types::DEFAULT,
                    config.cache_config(cache_types::DEFAULT),
                ))
            })
            .clone();

        info!(types = caches.len(), "cache store initialized");

        Self {
            caches,
            default,
            invalidation: config.invalidation.clone(),
            sweepers: Mutex::new(Vec::new()),
        }
    }

    fn cache(&self, cache_type: &str) -> &Arc<TypedCache> {
        self.caches.get(cache_type).unwrap_or(&self.default)
    }

    /// Store a value in a cache type; `ttl` overrides the type default
    pub fn set(&self, cache_type: &str, key: &str, value: Value, ttl: Option<Duration>) -> bool {
        self.cache(cache_type).set(key, value, ttl)
    }

    /// Fetch a value copy from a cache type
    pub fn get(&self, cache_type: &str, key: &str) -> Option<Value> {
        self.cache(cache_type).get(key)
    }

    /// Remove one key; true when an entry existed (a removal count of 1
    /// versus 0, as [`mdel`](Self::mdel) reports for batches)
    pub fn delete(&self, cache_type: &str, key: &str) -> bool {
        self.cache(cache_type).delete(key)
    }

    /// Presence check without touching eviction state
    pub fn has(&self, cache_type: &str, key: &str) -> bool {
        self.cache(cache_type).has(key)
    }

    /// Remaining lifetime of an entry, when it has one
    pub fn ttl_remaining(&self, cache_type: &str, key: &str) -> Option<Duration> {
        self.cache(cache_type).ttl_remaining(key)
    }

    /// Store a batch of values; returns the number stored
    pub fn mset(&self, cache_type: &str, entries: Vec<(String, Value)>) -> usize {
        let cache = self.cache(cache_type);
        let count = entries.len();
        for (key, value) in entries {
            cache.set(&key, value, None);
        }
        count
    }

    /// Fetch a batch of values, position-aligned with `keys`
    pub fn mget(&self, cache_type: &str, keys: &[&str]) -> Vec<Option<Value>> {
        let cache = self.cache(cache_type);
        keys.iter().map(|key| cache.get(key)).collect()
    }

    /// Remove a batch of keys; returns the number that existed
    pub fn mdel(&self, cache_type: &str, keys: &[&str]) -> usize {
        let cache = self.cache(cache_type);
        keys.iter().filter(|key| cache.delete(key)).count()
    }

    /// Remove all keys in a type that start with `key_prefix`
    pub fn delete_prefix(&self, cache_type: &str, key_prefix: &str) -> usize {
        self.cache(cache_type).delete_prefix(key_prefix)
    }

    /// Drop every entry in one type
    pub fn clear(&self, cache_type: &str) -> usize {
        self.cache(cache_type).clear()
    }

    /// Drop every entry in every type
    pub fn clear_all(&self) -> usize {
        self.caches.values().map(|cache| cache.clear()).sum()
    }

    /// Statistics for a declared cache type
    pub fn stats(&self, cache_type: &str) -> Option<TypeStats> {
        self.caches.get(cache_type).map(|cache| cache.stats())
    }

    /// Per-type statistics plus aggregated totals
    pub fn aggregate_stats(&self) -> StoreStats {
        let per_type: HashMap<String, TypeStats> = self
            .caches
            .iter()
            .map(|(name, cache)| (name.clone(), cache.stats()))
            .collect();

        let mut total = TypeStats::default();
        for stats in per_type.values() {
            total.merge(stats);
        }

        StoreStats { per_type, total }
    }

    /// Apply the configured purges for a domain event
    ///
    /// Returns the number of entries removed. Unknown events purge nothing
    /// (logged at warn, since they usually mean a missing table entry).
    pub fn purge_event(&self, event: &str) -> usize {
        let Some(rules) = self.invalidation.get(event) else {
            warn!(event = %event, "no invalidation rules declared for event");
            return 0;
        };

        let mut removed = 0;
        for rule in rules {
            removed += match &rule.key_prefix {
                Some(prefix) => self.delete_prefix(&rule.cache_type, prefix),
                None => self.clear(&rule.cache_type),
            };
        }

        debug!(event = %event, removed, "event-driven cache purge applied");
        removed
    }

    /// Spawn one background sweep task per cache type
    ///
    /// Idempotent; subsequent calls are no-ops until [`CacheStore::shutdown`].
    pub fn spawn_sweepers(self: &Arc<Self>) {
        let mut sweepers = self.sweepers.lock();
        if !sweepers.is_empty() {
            return;
        }

        for cache in self.caches.values() {
            let cache = Arc::clone(cache);
            let handle = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(cache.sweep_interval());
                // First tick completes immediately; skip it
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let removed = cache.sweep();
                    if removed > 0 {
                        debug!(cache = cache.name(), removed, "swept expired entries");
                    }
                }
            });
            sweepers.push(handle);
        }

        info!(tasks = sweepers.len(), "cache sweepers started");
    }

    /// Stop sweep tasks and drop all cached state
    pub fn shutdown(&self) {
        for handle in self.sweepers.lock().drain(..) {
            handle.abort();
        }
        let dropped = self.clear_all();
        info!(dropped, "cache store shut down");
    }
}

/// Aggregated cache statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Statistics per declared cache type
    pub per_type: HashMap<String, TypeStats>,

    /// Counters summed across all types
    pub total: TypeStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> CacheStore {
        CacheStore::new(&AuthzConfig::default())
    }

    #[test]
    fn undeclared_types_route_to_the_default_cache() {
        let store = store();

        store.set("unheard_of", "k", json!(1), None);
        assert_eq!(store.get("unheard_of", "k"), Some(json!(1)));

        // Same backing instance as the declared default
        assert_eq!(store.get(cache_types::DEFAULT, "k"), Some(json!(1)));
    }

    #[test]
    fn types_are_isolated_from_each_other() {
        let store = store();

        store.set(cache_types::USERS, "alice", json!("admin"), None);
        assert!(store.get(cache_types::PERMISSIONS, "alice").is_none());
        assert!(store.has(cache_types::USERS, "alice"));
    }

    #[test]
    fn batch_operations_round_trip() {
        let store = store();

        let stored = store.mset(
            cache_types::SETTINGS,
            vec![
                ("theme".to_string(), json!("dark")),
                ("locale".to_string(), json!("en")),
            ],
        );
        assert_eq!(stored, 2);

        let values = store.mget(cache_types::SETTINGS, &["theme", "locale", "missing"]);
        assert_eq!(values, vec![Some(json!("dark")), Some(json!("en")), None]);

        assert_eq!(store.mdel(cache_types::SETTINGS, &["theme", "missing"]), 1);
        assert!(!store.has(cache_types::SETTINGS, "theme"));
    }

    #[test]
    fn clear_all_empties_every_type() {
        let store = store();

        store.set(cache_types::USERS, "a", json!(1), None);
        store.set(cache_types::SECTIONS, "b", json!(2), None);

        assert_eq!(store.clear_all(), 2);
        assert!(store.get(cache_types::USERS, "a").is_none());
    }

    #[test]
    fn purge_event_applies_declared_rules() {
        let store = store();

        store.set(cache_types::USERS, "alice", json!("admin"), None);
        store.set(cache_types::PERMISSIONS, "alice:users.edit", json!(true), None);
        store.set(cache_types::SECTIONS, "alice:reports:view", json!(true), None);

        let removed = store.purge_event("user.updated");
        assert_eq!(removed, 2);
        assert!(store.get(cache_types::USERS, "alice").is_none());
        assert!(store.get(cache_types::PERMISSIONS, "alice:users.edit").is_none());
        // sections are untouched by user.updated
        assert!(store.has(cache_types::SECTIONS, "alice:reports:view"));

        assert_eq!(store.purge_event("nothing.declared"), 0);
    }

    #[test]
    fn purge_event_prefix_rules_remove_only_matching_keys() {
        let mut config = AuthzConfig::default();
        config.invalidation.insert(
            "session.revoked".to_string(),
            vec![InvalidationRule::prefix(cache_types::PERMISSIONS, "alice:")],
        );
        let store = CacheStore::new(&config);

        store.set(cache_types::PERMISSIONS, "alice:users.edit", json!(true), None);
        store.set(cache_types::PERMISSIONS, "alice:reports.view", json!(true), None);
        store.set(cache_types::PERMISSIONS, "bob:users.edit", json!(false), None);
        store.set(cache_types::USERS, "alice", json!("admin"), None);

        assert_eq!(store.purge_event("session.revoked"), 2);
        assert!(!store.has(cache_types::PERMISSIONS, "alice:users.edit"));
        assert!(!store.has(cache_types::PERMISSIONS, "alice:reports.view"));
        // other users' entries and other types survive a prefixed purge
        assert!(store.has(cache_types::PERMISSIONS, "bob:users.edit"));
        assert!(store.has(cache_types::USERS, "alice"));
    }

    #[test]
    fn aggregate_stats_sum_per_type_counters() {
        let store = store();

        store.set(cache_types::USERS, "a", json!(1), None);
        assert!(store.get(cache_types::USERS, "a").is_some());
        assert!(store.get(cache_types::SECTIONS, "nope").is_none());

        let stats = store.aggregate_stats();
        assert_eq!(stats.total.hits, 1);
        assert_eq!(stats.total.misses, 1);
        assert_eq!(stats.per_type.get(cache_types::USERS).unwrap().hits, 1);
        assert!((stats.total.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn sweepers_spawn_once_and_shut_down() {
        let store = Arc::new(store());

        store.spawn_sweepers();
        let count = store.sweepers.lock().len();
        assert!(count > 0);

        store.spawn_sweepers();
        assert_eq!(store.sweepers.lock().len(), count);

        store.set(cache_types::USERS, "a", json!(1), None);
        store.shutdown();
        assert!(store.sweepers.lock().is_empty());
        assert!(store.get(cache_types::USERS, "a").is_none());
    }
}
