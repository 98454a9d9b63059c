//! Static configuration surface
//!
//! Everything the engine needs at startup is declared here: the role table,
//! the permission catalog, the role→permission map (wildcard-capable), the
//! per-cache-type tuning, and the event→invalidation table. The whole
//! structure is serde-deserializable so deployments can ship it as JSON;
//! `AuthzConfig::default()` carries the built-in declarations.

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Built-in role names, lowest level first.
pub mod roles {
    pub const USER: &str = "user";
    pub const MODERATOR: &str = "moderator";
    pub const MANAGER: &str = "manager";
    pub const ADMIN: &str = "admin";
    pub const SUPER_ADMIN: &str = "super_admin";
}

/// Cache type names recognized by the default configuration.
pub mod cache_types {
    pub const USERS: &str = "users";
    pub const SECTIONS: &str = "sections";
    pub const PERMISSIONS: &str = "permissions";
    pub const WORKFLOWS: &str = "workflows";
    pub const CONVERSATIONS: &str = "conversations";
    pub const SETTINGS: &str = "settings";
    pub const DEFAULT: &str = "default";
}

/// Eviction strategy a cache type must honor once its capacity is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    /// Evict the least recently used entry
    Recency,
    /// Evict the least frequently hit entry
    Frequency,
    /// Evict the oldest inserted entry (FIFO)
    InsertionOrder,
}

/// Role table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDef {
    /// Role name (e.g., "moderator")
    pub name: String,

    /// Hierarchy level; strictly ordered, unique per role
    pub level: u8,

    /// Display label
    pub label: String,
}

impl RoleDef {
    fn new(name: &str, level: u8, label: &str) -> Self {
        Self {
            name: name.to_string(),
            level,
            label: label.to_string(),
        }
    }
}

/// Tuning for one cache type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTypeConfig {
    /// Key namespace label; entries are stored as "{prefix}:{key}"
    pub prefix: String,

    /// Entry time-to-live in seconds; 0 means never expire
    pub ttl_secs: u64,

    /// Soft capacity; reaching it evicts per the declared policy
    pub max_entries: usize,

    /// Eviction strategy for this type
    pub eviction: EvictionPolicy,

    /// Interval between proactive expired-entry sweeps, in seconds
    pub sweep_secs: u64,
}

impl CacheTypeConfig {
    fn new(
        prefix: &str,
        ttl_secs: u64,
        max_entries: usize,
        eviction: EvictionPolicy,
        sweep_secs: u64,
    ) -> Self {
        Self {
            prefix: prefix.to_string(),
            ttl_secs,
            max_entries,
            eviction,
            sweep_secs,
        }
    }
}

/// One purge to apply when a domain event fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationRule {
    /// Cache type to purge
    pub cache_type: String,

    /// When present, only keys with this prefix are removed;
    /// otherwise the whole type is cleared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
}

impl InvalidationRule {
    /// Clear an entire cache type
    pub fn clear(cache_type: &str) -> Self {
        Self {
            cache_type: cache_type.to_string(),
            key_prefix: None,
        }
    }

    /// Remove keys with the given prefix from a cache type
    pub fn prefix(cache_type: &str, key_prefix: &str) -> Self {
        Self {
            cache_type: cache_type.to_string(),
            key_prefix: Some(key_prefix.to_string()),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthzConfig {
    /// Role table (name, level, display label)
    pub roles: Vec<RoleDef>,

    /// Permission catalog: category → concrete permission strings
    pub categories: HashMap<String, Vec<String>>,

    /// Role → granted permission tokens; supports "*" and "category.*"
    pub role_permissions: HashMap<String, Vec<String>>,

    /// Per-cache-type tuning, keyed by type name; must include "default"
    pub caches: HashMap<String, CacheTypeConfig>,

    /// Domain event → purges to apply after the corresponding write
    #[serde(default)]
    pub invalidation: HashMap<String, Vec<InvalidationRule>>,
}

impl AuthzConfig {
    /// Load a configuration from a JSON document
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| AuthzError::Validation(format!("invalid configuration: {}", e)))
    }

    /// Tuning for a cache type, falling back to the catch-all default
    pub fn cache_config(&self, cache_type: &str) -> &CacheTypeConfig {
        self.caches
            .get(cache_type)
            .or_else(|| self.caches.get(cache_types::DEFAULT))
            .unwrap_or(&FALLBACK_CACHE)
    }
}

// Used only when a configuration omits the "default" cache type.
static FALLBACK_CACHE: CacheTypeConfig = CacheTypeConfig {
    prefix: String::new(),
    ttl_secs: 600,
    max_entries: 1_000,
    eviction: EvictionPolicy::Recency,
    sweep_secs: 300,
};

impl Default for AuthzConfig {
    fn default() -> Self {
        let roles = vec![
            RoleDef::new(roles::USER, 1, "User"),
            RoleDef::new(roles::MODERATOR, 2, "Moderator"),
            RoleDef::new(roles::MANAGER, 3, "Manager"),
            RoleDef::new(roles::ADMIN, 4, "Admin"),
            RoleDef::new(roles::SUPER_ADMIN, 5, "Super Admin"),
        ];

        let categories = HashMap::from([
            (
                "users".to_string(),
                str_vec(&["users.view", "users.create", "users.edit", "users.delete"]),
            ),
            (
                "sections".to_string(),
                str_vec(&[
                    "sections.view",
                    "sections.create",
                    "sections.edit",
                    "sections.delete",
                    "sections.execute",
                ]),
            ),
            (
                "workflows".to_string(),
                str_vec(&["workflows.view", "workflows.approve", "workflows.reject"]),
            ),
            (
                "conversations".to_string(),
                str_vec(&[
                    "conversations.view",
                    "conversations.assign",
                    "conversations.close",
                ]),
            ),
            (
                "settings".to_string(),
                str_vec(&["settings.view", "settings.edit"]),
            ),
        ]);

        let role_permissions = HashMap::from([
            (
                roles::USER.to_string(),
                str_vec(&["sections.view", "conversations.view"]),
            ),
            (
                roles::MODERATOR.to_string(),
                str_vec(&["sections.view", "conversations.*", "workflows.view"]),
            ),
            (
                roles::MANAGER.to_string(),
                str_vec(&["sections.*", "conversations.*", "workflows.*", "users.view"]),
            ),
            (
                roles::ADMIN.to_string(),
                str_vec(&[
                    "users.*",
                    "sections.*",
                    "workflows.*",
                    "conversations.*",
                    "settings.view",
                ]),
            ),
            (roles::SUPER_ADMIN.to_string(), str_vec(&["*"])),
        ]);

        let caches = HashMap::from([
            (
                cache_types::USERS.to_string(),
                CacheTypeConfig::new("usr", 1_800, 5_000, EvictionPolicy::Recency, 300),
            ),
            (
                cache_types::SECTIONS.to_string(),
                CacheTypeConfig::new("sec", 900, 2_000, EvictionPolicy::Recency, 300),
            ),
            (
                cache_types::PERMISSIONS.to_string(),
                CacheTypeConfig::new("perm", 900, 20_000, EvictionPolicy::Frequency, 120),
            ),
            (
                cache_types::WORKFLOWS.to_string(),
                CacheTypeConfig::new("wf", 600, 1_000, EvictionPolicy::InsertionOrder, 300),
            ),
            (
                cache_types::CONVERSATIONS.to_string(),
                CacheTypeConfig::new("conv", 300, 5_000, EvictionPolicy::Recency, 120),
            ),
            (
                cache_types::SETTINGS.to_string(),
                CacheTypeConfig::new("set", 0, 500, EvictionPolicy::InsertionOrder, 600),
            ),
            (
                cache_types::DEFAULT.to_string(),
                CacheTypeConfig::new("gen", 600, 1_000, EvictionPolicy::Recency, 300),
            ),
        ]);

        let invalidation = HashMap::from([
            (
                "user.updated".to_string(),
                vec![
                    InvalidationRule::clear(cache_types::USERS),
                    InvalidationRule::clear(cache_types::PERMISSIONS),
                ],
            ),
            (
                "user.deleted".to_string(),
                vec![
                    InvalidationRule::clear(cache_types::USERS),
                    InvalidationRule::clear(cache_types::PERMISSIONS),
                    InvalidationRule::clear(cache_types::SECTIONS),
                ],
            ),
            (
                "section.updated".to_string(),
                vec![InvalidationRule::clear(cache_types::SECTIONS)],
            ),
            (
                "section.deleted".to_string(),
                vec![InvalidationRule::clear(cache_types::SECTIONS)],
            ),
            (
                "settings.updated".to_string(),
                vec![InvalidationRule::clear(cache_types::SETTINGS)],
            ),
        ]);

        Self {
            roles,
            categories,
            role_permissions,
            caches,
            invalidation,
        }
    }
}

fn str_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
