//! Workspace membership

use super::common::EntityId;
use super::user::SubjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Lifecycle state of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// Placeholder account created by an invite, pending activation
    Invited,
    Active,
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberStatus::Invited => write!(f, "invited"),
            MemberStatus::Active => write!(f, "active"),
        }
    }
}

/// A subject holding a role in a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub subject: SubjectId,
    pub role: String,
    pub enabled: bool,
    pub joined_at: DateTime<Utc>,
}

impl Member {
    pub fn new(subject: SubjectId, role: impl Into<String>, enabled: bool) -> Self {
        Self {
            subject,
            role: role.into(),
            enabled,
            joined_at: Utc::now(),
        }
    }

    pub fn status(&self) -> MemberStatus {
        if self.enabled {
            MemberStatus::Active
        } else {
            MemberStatus::Invited
        }
    }
}

/// Bulk invite request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InviteMembersInput {
    pub workspace_id: EntityId,
    #[validate(length(min = 1, max = 100))]
    pub subjects: Vec<String>,
    #[validate(length(min = 1, max = 100))]
    pub role_name: String,
}
