//! Write path: role assignment, promotion, demotion, and role statistics
//!
//! Unlike the read path, these operations surface typed errors; silently
//! failing a role change would be worse than reporting it. Once the role
//! write is committed, cache invalidation and audit logging are best
//! effort: their failures are logged, never rolled back.

use super::AuthzService;
use crate::error::{AuthzError, Result};
use crate::store::AuditEntry;
use std::collections::HashMap;
use tracing::{debug, error, info};

/// Permission gating all role mutations
const USERS_EDIT: &str = "users.edit";

impl AuthzService {
    /// Assign a role to a user on behalf of an acting administrator
    ///
    /// The actor must hold `users.edit` and must outrank the role being
    /// granted: an actor can only grant roles strictly below its own level,
    /// which also rules out self- and peer-escalation.
    ///
    /// # Errors
    ///
    /// `Validation` for an unknown role name, `NotFound` for a missing
    /// actor or target, `Permission` when the actor lacks authority, and
    /// `Store` when persistence fails.
    pub async fn assign_role(
        &self,
        target_user_id: &str,
        new_role: &str,
        acting_admin_id: &str,
    ) -> Result<()> {
        if self.registry.role(new_role).is_none() {
            return Err(AuthzError::Validation(format!(
                "unknown role: {}",
                new_role
            )));
        }

        let actor = self
            .store
            .get_user(acting_admin_id)
            .await?
            .ok_or_else(|| {
                AuthzError::NotFound(format!("acting user not found: {}", acting_admin_id))
            })?;

        if !self.check_permission(acting_admin_id, USERS_EDIT).await {
            return Err(AuthzError::Permission(format!(
                "'{}' lacks the {} permission",
                acting_admin_id, USERS_EDIT
            )));
        }

        if !self.registry.is_higher(&actor.role, new_role) {
            return Err(AuthzError::Permission(format!(
                "role '{}' cannot grant role '{}'",
                actor.role, new_role
            )));
        }

        let target = self.store.get_user(target_user_id).await?.ok_or_else(|| {
            AuthzError::NotFound(format!("target user not found: {}", target_user_id))
        })?;
        let old_role = target.role.clone();

        if !self.store.update_user_role(target_user_id, new_role).await? {
            return Err(AuthzError::NotFound(format!(
                "target user vanished during role update: {}",
                target_user_id
            )));
        }

        // The role write is committed; everything below is best effort
        let purged = self.invalidate_user(target_user_id);
        debug!(target = %target_user_id, purged, "stale cache entries purged after role change");

        let entry = AuditEntry::role_change(
            acting_admin_id,
            target_user_id,
            Some(old_role.clone()),
            new_role,
        );
        if let Err(e) = self.store.append_audit(entry).await {
            error!(target = %target_user_id, error = %e, "audit append failed after committed role change");
        }

        info!(
            actor = %acting_admin_id,
            target = %target_user_id,
            old_role = %old_role,
            new_role = %new_role,
            "role assigned"
        );
        Ok(())
    }

    /// Reset a user to the lowest role in the hierarchy
    pub async fn remove_role(&self, user_id: &str, admin_id: &str) -> Result<()> {
        let base = self
            .registry
            .roles()
            .first()
            .ok_or_else(|| AuthzError::Internal("role table is empty".to_string()))?
            .name
            .clone();
        self.assign_role(user_id, &base, admin_id).await
    }

    /// Move a user one step up the hierarchy
    ///
    /// # Errors
    ///
    /// `Permission` when the user already holds the highest role, plus
    /// everything [`AuthzService::assign_role`] raises.
    pub async fn promote_user(&self, user_id: &str, admin_id: &str) -> Result<()> {
        let next = self.adjacent_role(user_id, 1).await?.ok_or_else(|| {
            AuthzError::Permission(format!("'{}' already holds the highest role", user_id))
        })?;
        self.assign_role(user_id, &next, admin_id).await
    }

    /// Move a user one step down the hierarchy
    ///
    /// # Errors
    ///
    /// `Permission` when the user already holds the lowest role, plus
    /// everything [`AuthzService::assign_role`] raises.
    pub async fn demote_user(&self, user_id: &str, admin_id: &str) -> Result<()> {
        let previous = self.adjacent_role(user_id, -1).await?.ok_or_else(|| {
            AuthzError::Permission(format!("'{}' already holds the lowest role", user_id))
        })?;
        self.assign_role(user_id, &previous, admin_id).await
    }

    /// The role one step away from the user's current role, if any
    async fn adjacent_role(&self, user_id: &str, step: i64) -> Result<Option<String>> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("user not found: {}", user_id)))?;

        let roles = self.registry.roles();
        let position = roles
            .iter()
            .position(|r| r.name == user.role)
            .ok_or_else(|| {
                AuthzError::Validation(format!(
                    "user '{}' holds unknown role '{}'",
                    user_id, user.role
                ))
            })?;

        let adjacent = position
            .checked_add_signed(step as isize)
            .and_then(|idx| roles.get(idx));
        Ok(adjacent.map(|r| r.name.clone()))
    }

    /// Count of users per role; roles with no users report zero
    pub async fn role_stats(&self) -> Result<HashMap<String, usize>> {
        let mut counts: HashMap<String, usize> = self
            .registry
            .roles()
            .iter()
            .map(|r| (r.name.clone(), 0))
            .collect();

        for user in self.store.list_users().await? {
            *counts.entry(user.role).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// User ids currently holding a role, sorted
    ///
    /// # Errors
    ///
    /// `Validation` for an unknown role name.
    pub async fn users_by_role(&self, role: &str) -> Result<Vec<String>> {
        if self.registry.role(role).is_none() {
            return Err(AuthzError::Validation(format!("unknown role: {}", role)));
        }

        let mut ids: Vec<String> = self
            .store
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.role == role)
            .map(|u| u.id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}
