//! Role & permission registry
//!
//! Pure catalog of roles, hierarchy levels, and role→permission grants.
//! Built once from [`AuthzConfig`] and never mutated; it touches neither
//! the cache nor the record store.
//!
//! Permission tokens are dot-namespaced strings (`users.edit`). A grant of
//! `users.*` covers the whole `users` category, and the single token `*`
//! covers every permission in the system. Matching is plain case-sensitive
//! string comparison; there is deliberately no pattern engine here.

use crate::config::{roles, AuthzConfig};
use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

/// Token granting every permission in the system
pub const WILDCARD: &str = "*";

/// A role with its hierarchy level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role name (e.g., "moderator")
    pub name: String,

    /// Hierarchy level; higher levels manage lower ones
    pub level: u8,

    /// Display label
    pub label: String,
}

/// Static role and permission catalog
pub struct RoleRegistry {
    /// Roles sorted ascending by level
    roles: Vec<Role>,

    /// Role name → index into `roles`
    by_name: HashMap<String, usize>,

    /// Category → concrete permissions, used only for wildcard expansion
    catalog: BTreeMap<String, Vec<String>>,

    /// Role name → granted tokens (concrete and/or wildcard)
    grants: HashMap<String, BTreeSet<String>>,
}

impl RoleRegistry {
    /// Build and validate a registry from configuration
    ///
    /// # Errors
    ///
    /// Returns a validation error if the role table is empty, a name or
    /// level is duplicated, or the super admin grant set is anything other
    /// than the lone `*` token.
    pub fn new(config: &AuthzConfig) -> Result<Self> {
        if config.roles.is_empty() {
            return Err(AuthzError::Validation("role table is empty".to_string()));
        }

        let mut sorted: Vec<Role> = config
            .roles
            .iter()
            .map(|def| Role {
                name: def.name.clone(),
                level: def.level,
                label: def.label.clone(),
            })
            .collect();
        sorted.sort_by_key(|r| r.level);

        let mut by_name = HashMap::new();
        for (idx, role) in sorted.iter().enumerate() {
            if by_name.insert(role.name.clone(), idx).is_some() {
                return Err(AuthzError::Validation(format!(
                    "duplicate role name: {}",
                    role.name
                )));
            }
        }
        for pair in sorted.windows(2) {
            if pair[0].level == pair[1].level {
                return Err(AuthzError::Validation(format!(
                    "duplicate role level {} ('{}' and '{}')",
                    pair[0].level, pair[0].name, pair[1].name
                )));
            }
        }

        let catalog: BTreeMap<String, Vec<String>> = config
            .categories
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut grants: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (role_name, tokens) in &config.role_permissions {
            if !by_name.contains_key(role_name) {
                warn!(role = %role_name, "permission grants for a role not in the role table");
            }
            grants.insert(role_name.clone(), tokens.iter().cloned().collect());
        }

        if let Some(super_grants) = grants.get(roles::SUPER_ADMIN) {
            if super_grants.len() != 1 || !super_grants.contains(WILDCARD) {
                return Err(AuthzError::Validation(format!(
                    "'{}' grants must be exactly {{\"*\"}}",
                    roles::SUPER_ADMIN
                )));
            }
        }

        // Concrete grants that no category declares are almost always typos.
        for (role_name, tokens) in &grants {
            for token in tokens {
                if token == WILDCARD || token.ends_with(".*") {
                    continue;
                }
                let category = category_of(token);
                let known = catalog
                    .get(category)
                    .map(|perms| perms.iter().any(|p| p == token))
                    .unwrap_or(false);
                if !known {
                    warn!(role = %role_name, permission = %token, "granted permission is not in the catalog");
                }
            }
        }

        Ok(Self {
            roles: sorted,
            by_name,
            catalog,
            grants,
        })
    }

    /// Look up a role by name
    pub fn role(&self, name: &str) -> Option<&Role> {
        self.by_name.get(name).map(|&idx| &self.roles[idx])
    }

    /// Look up a role by hierarchy level
    pub fn role_by_level(&self, level: u8) -> Option<&Role> {
        self.roles.iter().find(|r| r.level == level)
    }

    /// All roles, lowest level first
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Strict comparison of two roles by level only
    ///
    /// # Errors
    ///
    /// Returns a validation error if either name is unknown.
    pub fn compare(&self, a: &str, b: &str) -> Result<Ordering> {
        let left = self
            .role(a)
            .ok_or_else(|| AuthzError::Validation(format!("unknown role: {}", a)))?;
        let right = self
            .role(b)
            .ok_or_else(|| AuthzError::Validation(format!("unknown role: {}", b)))?;
        Ok(left.level.cmp(&right.level))
    }

    /// Whether `a` outranks `b`; false when either name is unknown
    pub fn is_higher(&self, a: &str, b: &str) -> bool {
        matches!(self.compare(a, b), Ok(Ordering::Greater))
    }

    /// Roles with a level strictly below the named role's level
    pub fn manageable_roles(&self, name: &str) -> Vec<&Role> {
        match self.role(name) {
            Some(role) => self.roles.iter().filter(|r| r.level < role.level).collect(),
            None => Vec::new(),
        }
    }

    /// Whether a role satisfies a permission string
    ///
    /// First match wins: the full wildcard, the exact token, then the
    /// category wildcard. Unknown roles hold nothing.
    pub fn has_permission(&self, role_name: &str, permission: &str) -> bool {
        let Some(tokens) = self.grants.get(role_name) else {
            return false;
        };

        if tokens.contains(WILDCARD) {
            return true;
        }
        if tokens.contains(permission) {
            return true;
        }

        let category_wildcard = format!("{}.*", category_of(permission));
        tokens.contains(category_wildcard.as_str())
    }

    /// Expand a role's grants into the full concrete permission set
    pub fn role_permissions(&self, role_name: &str) -> BTreeSet<String> {
        let Some(tokens) = self.grants.get(role_name) else {
            return BTreeSet::new();
        };

        if tokens.contains(WILDCARD) {
            return self.catalog.values().flatten().cloned().collect();
        }

        let mut expanded = BTreeSet::new();
        for token in tokens {
            if let Some(category) = token.strip_suffix(".*") {
                if let Some(perms) = self.catalog.get(category) {
                    expanded.extend(perms.iter().cloned());
                } else {
                    warn!(token = %token, "wildcard grant names an unknown category");
                }
            } else {
                expanded.insert(token.clone());
            }
        }
        expanded
    }
}

/// Namespace prefix of a permission string, before the first dot
fn category_of(permission: &str) -> &str {
    permission.split('.').next().unwrap_or(permission)
}
