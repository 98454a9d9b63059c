//! Read-path checks: permissions and section access
//!
//! All operations here fail closed and never raise; results are memoized
//! in the `permissions` and `sections` cache types.

use super::{AuthzService, SectionState};
use crate::config::cache_types;
use serde_json::Value;
use tracing::debug;

/// Action name whose rule governs plain section access
const VIEW_ACTION: &str = "view";

impl AuthzService {
    /// Whether the user's role satisfies a permission string
    pub async fn check_permission(&self, user_id: &str, permission: &str) -> bool {
        let key = format!("{}:{}", user_id, permission);

        if let Some(cached) = self.cache.get(cache_types::PERMISSIONS, &key) {
            if let Some(allowed) = cached.as_bool() {
                return allowed;
            }
        }

        // Unknown users are not cached: a negative entry would outlive the
        // user's creation
        let Some(role) = self.user_role(user_id).await else {
            return false;
        };

        let allowed = self.registry.has_permission(&role, permission);
        self.cache
            .set(cache_types::PERMISSIONS, &key, Value::Bool(allowed), None);

        debug!(user = %user_id, permission = %permission, role = %role, allowed, "permission evaluated");
        allowed
    }

    /// Whether the user holds every listed permission (short-circuit AND)
    pub async fn check_permissions(&self, user_id: &str, permissions: &[&str]) -> bool {
        for permission in permissions {
            if !self.check_permission(user_id, permission).await {
                return false;
            }
        }
        true
    }

    /// Whether the user holds any listed permission (short-circuit OR)
    pub async fn check_any_permission(&self, user_id: &str, permissions: &[&str]) -> bool {
        for permission in permissions {
            if self.check_permission(user_id, permission).await {
                return true;
            }
        }
        false
    }

    /// Whether the user may access a section at all (the `view` rule)
    ///
    /// A section with no `view` list is open to everyone. Missing sections
    /// and corrupt ACLs deny without caching; a disabled section is a
    /// cacheable denial, since re-enabling flows through explicit
    /// invalidation.
    pub async fn can_access_section(&self, user_id: &str, section_id: &str) -> bool {
        let key = section_key(user_id, section_id, VIEW_ACTION);

        if let Some(cached) = self.cache.get(cache_types::SECTIONS, &key) {
            if let Some(allowed) = cached.as_bool() {
                return allowed;
            }
        }

        match self.section_state(section_id).await {
            SectionState::Missing => false,
            SectionState::Corrupt | SectionState::Unavailable => false,
            SectionState::Disabled => {
                self.cache_section(&key, false);
                false
            }
            SectionState::Acl(acl) => match acl.action_roles(VIEW_ACTION) {
                None => {
                    self.cache_section(&key, true);
                    true
                }
                Some(allowed_roles) => {
                    let Some(role) = self.user_role(user_id).await else {
                        return false;
                    };
                    let allowed = allowed_roles.iter().any(|r| r == &role);
                    self.cache_section(&key, allowed);
                    debug!(user = %user_id, section = %section_id, role = %role, allowed, "section view evaluated");
                    allowed
                }
            },
        }
    }

    /// Whether the user may perform a specific action on a section
    ///
    /// When the ACL carries no list for the action, the decision delegates
    /// to [`AuthzService::can_access_section`]: a section that declares
    /// only a `view` list implicitly governs all unlisted actions with it.
    pub async fn can_perform_action(&self, user_id: &str, section_id: &str, action: &str) -> bool {
        if action == VIEW_ACTION {
            return self.can_access_section(user_id, section_id).await;
        }

        let key = section_key(user_id, section_id, action);

        if let Some(cached) = self.cache.get(cache_types::SECTIONS, &key) {
            if let Some(allowed) = cached.as_bool() {
                return allowed;
            }
        }

        match self.section_state(section_id).await {
            SectionState::Missing => false,
            SectionState::Corrupt | SectionState::Unavailable => false,
            SectionState::Disabled => {
                self.cache_section(&key, false);
                false
            }
            SectionState::Acl(acl) => match acl.action_roles(action) {
                // No list for this action: the view rule decides (and its
                // own key memoizes the result)
                None => self.can_access_section(user_id, section_id).await,
                Some(allowed_roles) => {
                    let Some(role) = self.user_role(user_id).await else {
                        return false;
                    };
                    let allowed = allowed_roles.iter().any(|r| r == &role);
                    self.cache_section(&key, allowed);
                    debug!(user = %user_id, section = %section_id, action = %action, role = %role, allowed, "section action evaluated");
                    allowed
                }
            },
        }
    }

    fn cache_section(&self, key: &str, allowed: bool) {
        self.cache
            .set(cache_types::SECTIONS, key, Value::Bool(allowed), None);
    }

    /// Remove every cache entry tied to one user across all types
    ///
    /// Used by role mutations; returns the number of entries removed.
    pub fn invalidate_user(&self, user_id: &str) -> usize {
        let prefix = format!("{}:", user_id);
        let mut removed = usize::from(self.cache.delete(cache_types::USERS, user_id));
        removed += self.cache.delete_prefix(cache_types::PERMISSIONS, &prefix);
        removed += self.cache.delete_prefix(cache_types::SECTIONS, &prefix);
        removed
    }
}

fn section_key(user_id: &str, section_id: &str, action: &str) -> String {
    format!("{}:{}:{}", user_id, section_id, action)
}
