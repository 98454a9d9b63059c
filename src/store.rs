//! External record store seam
//!
//! The engine never owns user or section records; it consumes them through
//! [`RecordStore`], the async I/O boundary. Deployments adapt their real
//! persistence behind this trait; [`InMemoryRecordStore`] backs tests and
//! small installations.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// User record as stored externally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User identifier
    pub id: String,

    /// Current role name
    pub role: String,

    /// Disabled accounts resolve to no role
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

impl UserRecord {
    /// Create an enabled user with the given role
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            enabled: true,
        }
    }

    /// Mark the account disabled
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Section record as stored externally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRecord {
    /// Section identifier
    pub id: String,

    /// Disabled sections deny all access
    #[serde(default = "enabled_default")]
    pub enabled: bool,

    /// Optional JSON-encoded action→roles ACL blob
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

impl SectionRecord {
    /// Create an enabled section with no ACL (open)
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            permissions: None,
        }
    }

    /// Attach an encoded ACL blob
    pub fn with_permissions(mut self, blob: impl Into<String>) -> Self {
        self.permissions = Some(blob.into());
        self
    }

    /// Mark the section disabled
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Append-only audit record for a role change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry identifier
    pub id: Uuid,

    /// Administrator who performed the change
    pub actor: String,

    /// User whose role changed
    pub target: String,

    /// Role held before the change
    pub old_role: Option<String>,

    /// Role granted by the change
    pub new_role: String,

    /// When the change was committed
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Build an entry for a committed role change
    pub fn role_change(
        actor: impl Into<String>,
        target: impl Into<String>,
        old_role: Option<String>,
        new_role: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor: actor.into(),
            target: target.into(),
            old_role,
            new_role: new_role.into(),
            timestamp: Utc::now(),
        }
    }
}

/// External record store operations consumed by the engine
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a user record
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>>;

    /// Persist a user's new role; false when the user does not exist
    async fn update_user_role(&self, user_id: &str, role: &str) -> Result<bool>;

    /// Fetch a section record
    async fn get_section(&self, section_id: &str) -> Result<Option<SectionRecord>>;

    /// Append an audit record; never read back by this engine
    async fn append_audit(&self, entry: AuditEntry) -> Result<()>;

    /// List all user records, used for role statistics
    async fn list_users(&self) -> Result<Vec<UserRecord>>;
}

/// In-memory record store implementation
pub struct InMemoryRecordStore {
    users: RwLock<HashMap<String, UserRecord>>,
    sections: RwLock<HashMap<String, SectionRecord>>,
    audit: RwLock<Vec<AuditEntry>>,
}

impl InMemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            sections: RwLock::new(HashMap::new()),
            audit: RwLock::new(Vec::new()),
        }
    }

    /// Insert or replace a user record
    pub async fn insert_user(&self, user: UserRecord) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    /// Insert or replace a section record
    pub async fn insert_section(&self, section: SectionRecord) {
        self.sections.write().await.insert(section.id.clone(), section);
    }

    /// Snapshot of the audit log
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.read().await.clone()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn update_user_role(&self, user_id: &str, role: &str) -> Result<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(user_id) {
            Some(user) => {
                user.role = role.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_section(&self, section_id: &str) -> Result<Option<SectionRecord>> {
        Ok(self.sections.read().await.get(section_id).cloned())
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<()> {
        self.audit.write().await.push(entry);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        Ok(self.users.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn user_round_trip_and_role_update() {
        let store = InMemoryRecordStore::new();
        store.insert_user(UserRecord::new("alice", "manager")).await;

        let fetched = store.get_user("alice").await.unwrap().unwrap();
        assert_eq!(fetched.role, "manager");
        assert!(fetched.enabled);

        assert!(store.update_user_role("alice", "admin").await.unwrap());
        assert_eq!(store.get_user("alice").await.unwrap().unwrap().role, "admin");

        assert!(!store.update_user_role("ghost", "admin").await.unwrap());
        assert!(store.get_user("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sections_round_trip() {
        let store = InMemoryRecordStore::new();
        store
            .insert_section(SectionRecord::new("reports").with_permissions(r#"{"view":["admin"]}"#))
            .await;

        let fetched = store.get_section("reports").await.unwrap().unwrap();
        assert!(fetched.permissions.is_some());
        assert!(store.get_section("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn audit_log_is_append_only() {
        let store = InMemoryRecordStore::new();
        store
            .append_audit(AuditEntry::role_change(
                "root",
                "alice",
                Some("user".to_string()),
                "moderator",
            ))
            .await
            .unwrap();

        let entries = store.audit_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor, "root");
        assert_eq!(entries[0].new_role, "moderator");
        assert_eq!(entries[0].old_role.as_deref(), Some("user"));
    }
}
