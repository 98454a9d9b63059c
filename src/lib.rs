//! # authgate
//!
//! Role-based authorization engine with typed cache-aside memoization.
//!
//! Given a principal and a requested capability (a permission string, or an
//! action on a named "section" resource), the engine decides allow/deny,
//! keeping results coherent with the latest role and ACL state.
//!
//! ## Features
//!
//! - **Strict role hierarchy** — five levels; an actor may only grant roles
//!   strictly below its own
//! - **Wildcard permissions** — `users.edit`, `users.*`, and the full `*`,
//!   matched by plain string comparison
//! - **Per-section ACL overrides** — action→roles lists with open-by-default
//!   and view-rule fallback semantics
//! - **Typed cache store** — per-type TTL, capacity, and a mechanically
//!   enforced eviction policy (recency, frequency, or insertion order)
//! - **Caller-driven invalidation** — a declared event→purge table plus
//!   per-user prefix invalidation on role changes
//! - **Fail-closed reads** — read-path errors are logged and become denials;
//!   write-path errors are typed and surfaced
//!
//! ## Example
//!
//! ```rust
//! use authgate::{AuthzConfig, AuthzService, InMemoryRecordStore, UserRecord};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> authgate::Result<()> {
//!     let store = Arc::new(InMemoryRecordStore::new());
//!     store.insert_user(UserRecord::new("alice", "admin")).await;
//!
//!     let service = AuthzService::from_config(&AuthzConfig::default(), store.clone())?;
//!
//!     assert!(service.check_permission("alice", "users.edit").await);
//!     assert!(!service.check_permission("alice", "settings.edit").await);
//!
//!     service.shutdown();
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod registry;
pub mod section;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use cache::{CacheStore, StoreStats, TypeStats, TypedCache};
pub use config::{
    cache_types, roles, AuthzConfig, CacheTypeConfig, EvictionPolicy, InvalidationRule, RoleDef,
};
pub use error::{AuthzError, Result};
pub use registry::{Role, RoleRegistry};
pub use section::{AclParseError, SectionAcl};
pub use service::AuthzService;
pub use store::{AuditEntry, InMemoryRecordStore, RecordStore, SectionRecord, UserRecord};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
