//! Authorization service
//!
//! The facade collaborators call. Read-path operations (permission checks,
//! section access) are cache-aside and never raise: internal failures are
//! logged and converted to the fail-closed value. Write-path operations
//! (role assignment and its derivatives, in [`hierarchy`]) surface typed
//! errors instead.
//!
//! Collaborators are constructor-injected so tests can substitute fakes:
//! the pure [`RoleRegistry`], the [`CacheStore`], and the external
//! [`RecordStore`].

mod checks;
mod hierarchy;

use crate::cache::CacheStore;
use crate::config::{cache_types, AuthzConfig};
use crate::error::Result;
use crate::registry::RoleRegistry;
use crate::section::SectionAcl;
use crate::store::RecordStore;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Role-based authorization engine with memoized decisions
pub struct AuthzService {
    registry: Arc<RoleRegistry>,
    cache: Arc<CacheStore>,
    store: Arc<dyn RecordStore>,
}

impl AuthzService {
    /// Assemble a service from already-built collaborators
    pub fn new(
        registry: Arc<RoleRegistry>,
        cache: Arc<CacheStore>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            registry,
            cache,
            store,
        }
    }

    /// Build registry and cache from configuration and assemble the service
    ///
    /// Sweep tasks are not started here; call
    /// [`CacheStore::spawn_sweepers`] on [`AuthzService::cache`] once a
    /// runtime is available.
    pub fn from_config(config: &AuthzConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        let registry = Arc::new(RoleRegistry::new(config)?);
        let cache = Arc::new(CacheStore::new(config));
        Ok(Self::new(registry, cache, store))
    }

    /// The role and permission catalog
    pub fn registry(&self) -> &Arc<RoleRegistry> {
        &self.registry
    }

    /// The typed cache store
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Resolve a user's role name, cache-aside
    ///
    /// Unknown and disabled users resolve to `None` and are not cached, so
    /// a user created moments later is seen immediately. Store failures are
    /// logged and also resolve to `None`.
    pub async fn user_role(&self, user_id: &str) -> Option<String> {
        if let Some(cached) = self.cache.get(cache_types::USERS, user_id) {
            if let Some(role) = cached.as_str() {
                return Some(role.to_string());
            }
        }

        match self.store.get_user(user_id).await {
            Ok(Some(user)) if user.enabled => {
                self.cache.set(
                    cache_types::USERS,
                    user_id,
                    Value::String(user.role.clone()),
                    None,
                );
                Some(user.role)
            }
            Ok(Some(_)) => {
                debug!(user = %user_id, "disabled user resolves to no role");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(user = %user_id, error = %e, "user lookup failed; treating as no role");
                None
            }
        }
    }

    /// Expand a user's role into its full concrete permission set
    ///
    /// Empty for unknown or disabled users and on lookup failure.
    pub async fn user_permissions(&self, user_id: &str) -> BTreeSet<String> {
        match self.user_role(user_id).await {
            Some(role) => self.registry.role_permissions(&role),
            None => BTreeSet::new(),
        }
    }

    /// Stop background cache work and drop cached state
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }

    /// Fetch and decode a section's ACL, classifying every failure mode
    pub(crate) async fn section_state(&self, section_id: &str) -> SectionState {
        match self.store.get_section(section_id).await {
            Ok(None) => SectionState::Missing,
            Ok(Some(section)) if !section.enabled => SectionState::Disabled,
            Ok(Some(section)) => match SectionAcl::parse(section.permissions.as_deref()) {
                Ok(acl) => SectionState::Acl(acl),
                Err(e) => {
                    warn!(section = %section_id, error = %e, "section ACL failed to parse; denying access");
                    SectionState::Corrupt
                }
            },
            Err(e) => {
                warn!(section = %section_id, error = %e, "section lookup failed; denying access");
                SectionState::Unavailable
            }
        }
    }
}

/// Outcome of resolving a section record and its ACL
pub(crate) enum SectionState {
    /// No such section; transient, never cached
    Missing,
    /// Section exists but is disabled; denial is cacheable
    Disabled,
    /// ACL blob failed to decode; fail closed, never cached
    Corrupt,
    /// Store fetch failed; fail closed, never cached
    Unavailable,
    /// Decoded ACL (possibly open)
    Acl(SectionAcl),
}
