//! Section ACL decoding
//!
//! Sections carry an optional JSON-encoded `permissions` blob mapping an
//! action name (`view`, `create`, `edit`, ...) to the role names allowed to
//! perform it. The blob is decoded defensively into a tagged result: a
//! *missing* blob is an open ACL, but a *corrupt* blob is a parse error the
//! caller routes to its fail-closed path.

use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// A section `permissions` blob that could not be decoded
#[derive(Debug, Error)]
#[error("malformed section ACL: {0}")]
pub struct AclParseError(pub String);

/// Per-action role allow-lists for one section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SectionAcl {
    actions: HashMap<String, Vec<String>>,
}

impl SectionAcl {
    /// Decode an optional ACL blob
    ///
    /// `None` and blank blobs decode to the open (empty) ACL.
    pub fn parse(blob: Option<&str>) -> Result<Self, AclParseError> {
        match blob {
            None => Ok(Self::default()),
            Some(raw) if raw.trim().is_empty() => Ok(Self::default()),
            Some(raw) => {
                serde_json::from_str(raw).map_err(|e| AclParseError(e.to_string()))
            }
        }
    }

    /// Roles listed for an action
    ///
    /// Returns `None` when the action has no list or an empty one, which
    /// callers treat as "open" for `view` and "fall back to the view rule"
    /// for any other action.
    pub fn action_roles(&self, action: &str) -> Option<&[String]> {
        match self.actions.get(action) {
            Some(list) if !list.is_empty() => Some(list.as_slice()),
            _ => None,
        }
    }

    /// Membership test against an action's list
    ///
    /// `None` means the action carries no list and the caller must apply
    /// its fallback rule.
    pub fn allows(&self, action: &str, role: &str) -> Option<bool> {
        self.action_roles(action)
            .map(|list| list.iter().any(|r| r == role))
    }
}
