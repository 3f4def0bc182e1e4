//! User and subject domain model

use super::common::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Normalized user identity (lower-cased, trimmed), typically an email address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Normalize a raw identifier. Fails when nothing is left after trimming.
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err("Subject id must not be empty".to_string());
        }
        Ok(SubjectId(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Part before '@', or the whole id when it is not an email address
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }
}

impl TryFrom<String> for SubjectId {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        SubjectId::parse(&value)
    }
}

impl From<SubjectId> for String {
    fn from(subject: SubjectId) -> Self {
        subject.0
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// User record as seen by the access-control core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub subject: SubjectId,
    /// False for placeholder accounts created by an invite
    pub enabled: bool,
    /// Workspaces this user is a member of
    pub workspace_ids: BTreeSet<EntityId>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(subject: SubjectId, enabled: bool) -> Self {
        Self {
            id: EntityId::new_v4(),
            subject,
            enabled,
            workspace_ids: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }
}
