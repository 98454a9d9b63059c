//! Single typed cache instance
//!
//! Each cache type owns entries of one logical domain, namespaced as
//! `"{prefix}:{key}"`. A type is configured with a TTL (0 = never expire),
//! a soft capacity, and an eviction policy that is honored operationally:
//! recency is backed by an [`lru::LruCache`], frequency by per-entry hit
//! counters, insertion order by a FIFO queue. Values are
//! [`serde_json::Value`] and are cloned in and out, so no caller ever holds
//! a reference into the cache.

use crate::config::{CacheTypeConfig, EvictionPolicy};
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
    hits: u64,
}

impl Entry {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|t| Instant::now() + t),
            hits: 0,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| now >= at)
    }
}

/// Storage backend selected by the eviction policy
enum Backend {
    Recency(LruCache<String, Entry>),
    Frequency {
        entries: HashMap<String, Entry>,
        max_entries: usize,
    },
    InsertionOrder {
        entries: HashMap<String, Entry>,
        order: VecDeque<String>,
        max_entries: usize,
    },
}

impl Backend {
    fn new(policy: EvictionPolicy, max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        match policy {
            EvictionPolicy::Recency => Backend::Recency(LruCache::new(
                NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN),
            )),
            EvictionPolicy::Frequency => Backend::Frequency {
                entries: HashMap::new(),
                max_entries,
            },
            EvictionPolicy::InsertionOrder => Backend::InsertionOrder {
                entries: HashMap::new(),
                order: VecDeque::new(),
                max_entries,
            },
        }
    }

    /// Fetch a live entry's value, updating recency/frequency bookkeeping.
    /// `Ok(None)` is a plain miss; `Err(())` marks an expired entry that was
    /// dropped on access.
    fn get(&mut self, key: &str, now: Instant) -> std::result::Result<Option<Value>, ()> {
        match self {
            Backend::Recency(lru) => {
                if matches!(lru.peek(key), Some(e) if e.is_expired(now)) {
                    lru.pop(key);
                    return Err(());
                }
                Ok(lru.get(key).map(|e| e.value.clone()))
            }
            Backend::Frequency { entries, .. } => {
                if matches!(entries.get(key), Some(e) if e.is_expired(now)) {
                    entries.remove(key);
                    return Err(());
                }
                Ok(entries.get_mut(key).map(|e| {
                    e.hits += 1;
                    e.value.clone()
                }))
            }
            Backend::InsertionOrder { entries, order, .. } => {
                if matches!(entries.get(key), Some(e) if e.is_expired(now)) {
                    entries.remove(key);
                    order.retain(|k| k != key);
                    return Err(());
                }
                Ok(entries.get(key).map(|e| e.value.clone()))
            }
        }
    }

    /// Non-promoting presence check
    fn peek(&self, key: &str, now: Instant) -> bool {
        match self {
            Backend::Recency(lru) => lru.peek(key).map_or(false, |e| !e.is_expired(now)),
            Backend::Frequency { entries, .. } | Backend::InsertionOrder { entries, .. } => {
                entries.get(key).map_or(false, |e| !e.is_expired(now))
            }
        }
    }

    fn ttl_remaining(&self, key: &str, now: Instant) -> Option<Duration> {
        let expires_at = match self {
            Backend::Recency(lru) => lru.peek(key)?.expires_at,
            Backend::Frequency { entries, .. } | Backend::InsertionOrder { entries, .. } => {
                entries.get(key)?.expires_at
            }
        };
        expires_at.and_then(|at| at.checked_duration_since(now))
    }

    /// Insert an entry, evicting per policy at capacity. Returns the number
    /// of entries evicted (0 or 1).
    fn insert(&mut self, key: String, entry: Entry) -> usize {
        match self {
            Backend::Recency(lru) => match lru.push(key.clone(), entry) {
                // push returns the displaced pair; a differing key means the
                // LRU victim was evicted rather than the same key replaced
                Some((old_key, _)) if old_key != key => 1,
                _ => 0,
            },
            Backend::Frequency {
                entries,
                max_entries,
            } => {
                let mut evicted = 0;
                if !entries.contains_key(&key) && entries.len() >= *max_entries {
                    let victim = entries
                        .iter()
                        .min_by_key(|(_, e)| e.hits)
                        .map(|(k, _)| k.clone());
                    if let Some(victim) = victim {
                        entries.remove(&victim);
                        evicted = 1;
                    }
                }
                entries.insert(key, entry);
                evicted
            }
            Backend::InsertionOrder {
                entries,
                order,
                max_entries,
            } => {
                if entries.contains_key(&key) {
                    // Replacement keeps the original queue position
                    entries.insert(key, entry);
                    return 0;
                }
                let mut evicted = 0;
                if entries.len() >= *max_entries {
                    while let Some(victim) = order.pop_front() {
                        if entries.remove(&victim).is_some() {
                            evicted = 1;
                            break;
                        }
                    }
                }
                order.push_back(key.clone());
                entries.insert(key, entry);
                evicted
            }
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        match self {
            Backend::Recency(lru) => lru.pop(key).is_some(),
            Backend::Frequency { entries, .. } => entries.remove(key).is_some(),
            Backend::InsertionOrder { entries, order, .. } => {
                let removed = entries.remove(key).is_some();
                if removed {
                    order.retain(|k| k != key);
                }
                removed
            }
        }
    }

    fn keys(&self) -> Vec<String> {
        match self {
            Backend::Recency(lru) => lru.iter().map(|(k, _)| k.clone()).collect(),
            Backend::Frequency { entries, .. } | Backend::InsertionOrder { entries, .. } => {
                entries.keys().cloned().collect()
            }
        }
    }

    fn expired_keys(&self, now: Instant) -> Vec<String> {
        match self {
            Backend::Recency(lru) => lru
                .iter()
                .filter(|(_, e)| e.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect(),
            Backend::Frequency { entries, .. } | Backend::InsertionOrder { entries, .. } => {
                entries
                    .iter()
                    .filter(|(_, e)| e.is_expired(now))
                    .map(|(k, _)| k.clone())
                    .collect()
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            Backend::Recency(lru) => lru.len(),
            Backend::Frequency { entries, .. } | Backend::InsertionOrder { entries, .. } => {
                entries.len()
            }
        }
    }

    fn clear(&mut self) -> usize {
        let count = self.len();
        match self {
            Backend::Recency(lru) => lru.clear(),
            Backend::Frequency { entries, .. } => entries.clear(),
            Backend::InsertionOrder { entries, order, .. } => {
                entries.clear();
                order.clear();
            }
        }
        count
    }
}

/// One named cache instance with TTL, capacity, and eviction policy
pub struct TypedCache {
    name: String,
    prefix: String,
    default_ttl: Option<Duration>,
    policy: EvictionPolicy,
    sweep_interval: Duration,
    backend: Mutex<Backend>,
    stats: DashMap<String, u64>,
}

impl TypedCache {
    /// Build a cache instance from its type configuration
    pub fn new(name: &str, config: &CacheTypeConfig) -> Self {
        let default_ttl = match config.ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            name: name.to_string(),
            prefix: config.prefix.clone(),
            default_ttl,
            policy: config.eviction,
            sweep_interval: Duration::from_secs(config.sweep_secs.max(1)),
            backend: Mutex::new(Backend::new(config.eviction, config.max_entries)),
            stats: DashMap::new(),
        }
    }

    /// Cache type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Eviction policy this instance enforces
    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Interval between proactive expired-entry sweeps
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    /// Store a value; `ttl` overrides the type default
    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool {
        let entry = Entry::new(value, ttl.or(self.default_ttl));
        let evicted = self.backend.lock().insert(self.namespaced(key), entry);
        if evicted > 0 {
            self.increment_stat("evictions", evicted as u64);
        }
        true
    }

    /// Fetch a value copy; expired entries are dropped on access
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let outcome = self.backend.lock().get(&self.namespaced(key), now);
        match outcome {
            Ok(Some(value)) => {
                self.increment_stat("hits", 1);
                Some(value)
            }
            Ok(None) => {
                self.increment_stat("misses", 1);
                None
            }
            Err(()) => {
                self.increment_stat("expirations", 1);
                None
            }
        }
    }

    /// Remove a key; true when an entry existed, i.e. a removal count of 1
    pub fn delete(&self, key: &str) -> bool {
        self.backend.lock().remove(&self.namespaced(key))
    }

    /// Presence check without touching recency or frequency state
    pub fn has(&self, key: &str) -> bool {
        self.backend.lock().peek(&self.namespaced(key), Instant::now())
    }

    /// Remaining lifetime of an entry; `None` when the key is absent,
    /// expired, or never expires (use [`TypedCache::has`] to distinguish)
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.backend
            .lock()
            .ttl_remaining(&self.namespaced(key), Instant::now())
    }

    /// Remove all keys starting with `key_prefix` (caller-side prefix,
    /// before namespacing); returns the number removed
    pub fn delete_prefix(&self, key_prefix: &str) -> usize {
        let full_prefix = self.namespaced(key_prefix);
        let mut backend = self.backend.lock();
        let victims: Vec<String> = backend
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(&full_prefix))
            .collect();
        for key in &victims {
            backend.remove(key);
        }
        victims.len()
    }

    /// Drop every entry; returns the number removed
    pub fn clear(&self) -> usize {
        self.backend.lock().clear()
    }

    /// Current entry count (expired-but-unswept entries included)
    pub fn len(&self) -> usize {
        self.backend.lock().len()
    }

    /// True when the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Proactively remove expired entries; returns the number removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut backend = self.backend.lock();
        let victims = backend.expired_keys(now);
        for key in &victims {
            backend.remove(key);
        }
        if !victims.is_empty() {
            self.increment_stat("expirations", victims.len() as u64);
        }
        victims.len()
    }

    /// Statistics snapshot for this type
    pub fn stats(&self) -> TypeStats {
        TypeStats {
            keys: self.len(),
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            expirations: self.get_stat("expirations"),
            evictions: self.get_stat("evictions"),
        }
    }

    fn increment_stat(&self, key: &str, by: u64) {
        self.stats
            .entry(key.to_string())
            .and_modify(|count| *count += by)
            .or_insert(by);
    }

    fn get_stat(&self, key: &str) -> u64 {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

/// Per-type cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeStats {
    pub keys: usize,
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
}

impl TypeStats {
    /// Hit rate over counted lookups
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Merge another type's counters into this one
    pub fn merge(&mut self, other: &TypeStats) {
        self.keys += other.keys;
        self.hits += other.hits;
        self.misses += other.misses;
        self.expirations += other.expirations;
        self.evictions += other.evictions;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache(ttl_secs: u64, max_entries: usize, eviction: EvictionPolicy) -> TypedCache {
        TypedCache::new(
            "test",
            &CacheTypeConfig {
                prefix: "t".to_string(),
                ttl_secs,
                max_entries,
                eviction,
                sweep_secs: 60,
            },
        )
    }

    #[test]
    fn set_get_round_trip_copies_values() {
        let cache = cache(60, 10, EvictionPolicy::Recency);

        cache.set("k", json!({"role": "admin"}), None);
        assert_eq!(cache.get("k"), Some(json!({"role": "admin"})));
        assert!(cache.has("k"));
        assert!(cache.get("missing").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = cache(60, 10, EvictionPolicy::Recency);

        cache.set("fast", json!(true), Some(Duration::from_millis(40)));
        cache.set("slow", json!(true), None);

        assert_eq!(cache.get("fast"), Some(json!(true)));

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(cache.get("fast").is_none());
        assert_eq!(cache.get("slow"), Some(json!(true)));
        assert!(cache.stats().expirations > 0);
    }

    #[test]
    fn zero_ttl_never_expires() {
        let cache = cache(0, 10, EvictionPolicy::InsertionOrder);

        cache.set("forever", json!(1), None);
        assert!(cache.has("forever"));
        assert!(cache.ttl_remaining("forever").is_none());
    }

    #[test]
    fn ttl_remaining_reports_lifetime() {
        let cache = cache(60, 10, EvictionPolicy::Recency);

        cache.set("k", json!(1), Some(Duration::from_secs(30)));
        let remaining = cache.ttl_remaining("k").unwrap();
        assert!(remaining <= Duration::from_secs(30));
        assert!(remaining > Duration::from_secs(25));

        assert!(cache.ttl_remaining("missing").is_none());
    }

    #[test]
    fn recency_policy_evicts_least_recently_used() {
        let cache = cache(60, 2, EvictionPolicy::Recency);

        cache.set("a", json!(1), None);
        cache.set("b", json!(2), None);
        // Touch "a" so "b" is the LRU victim
        assert!(cache.get("a").is_some());

        cache.set("c", json!(3), None);

        assert!(cache.has("a"));
        assert!(!cache.has("b"));
        assert!(cache.has("c"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn frequency_policy_evicts_least_hit() {
        let cache = cache(60, 2, EvictionPolicy::Frequency);

        cache.set("hot", json!(1), None);
        cache.set("cold", json!(2), None);
        for _ in 0..3 {
            assert!(cache.get("hot").is_some());
        }

        cache.set("new", json!(3), None);

        assert!(cache.has("hot"));
        assert!(!cache.has("cold"));
        assert!(cache.has("new"));
    }

    #[test]
    fn insertion_order_policy_evicts_oldest() {
        let cache = cache(60, 2, EvictionPolicy::InsertionOrder);

        cache.set("first", json!(1), None);
        cache.set("second", json!(2), None);
        // Heavy access must not save the oldest entry under FIFO
        for _ in 0..3 {
            assert!(cache.get("first").is_some());
        }

        cache.set("third", json!(3), None);

        assert!(!cache.has("first"));
        assert!(cache.has("second"));
        assert!(cache.has("third"));
    }

    #[test]
    fn replacing_a_key_does_not_evict() {
        let cache = cache(60, 2, EvictionPolicy::InsertionOrder);

        cache.set("a", json!(1), None);
        cache.set("b", json!(2), None);
        cache.set("a", json!(10), None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(json!(10)));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn delete_prefix_removes_matching_keys_only() {
        let cache = cache(60, 10, EvictionPolicy::Frequency);

        cache.set("alice:users.edit", json!(true), None);
        cache.set("alice:users.view", json!(true), None);
        cache.set("bob:users.edit", json!(false), None);

        assert_eq!(cache.delete_prefix("alice:"), 2);
        assert!(!cache.has("alice:users.edit"));
        assert!(cache.has("bob:users.edit"));
    }

    #[tokio::test]
    async fn sweep_drops_expired_entries() {
        let cache = cache(60, 10, EvictionPolicy::InsertionOrder);

        cache.set("a", json!(1), Some(Duration::from_millis(30)));
        cache.set("b", json!(2), None);

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.has("b"));
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = cache(60, 10, EvictionPolicy::Recency);

        cache.set("a", json!(1), None);
        cache.set("b", json!(2), None);

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn hit_rate_is_derived_from_counters() {
        let stats = TypeStats {
            keys: 0,
            hits: 3,
            misses: 1,
            expirations: 0,
            evictions: 0,
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(TypeStats::default().hit_rate(), 0.0);
    }
}
