//! Workspace domain model

use super::common::EntityId;
use super::member::Member;
use super::policy::PolicySet;
use super::user::SubjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Workspace entity: owns its member list and the root policy set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: EntityId,
    pub name: String,
    pub slug: String,
    pub domain: Option<String>,
    pub website: Option<String>,
    /// Subject that created the workspace
    pub email: Option<SubjectId>,
    /// Created automatically for a new user
    pub is_auto_generated: bool,
    /// Insertion order, owner first
    pub members: Vec<Member>,
    pub policies: PolicySet,
    /// Bumped on every save; a stale version is rejected
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Workspace {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new_v4(),
            name: String::new(),
            slug: String::new(),
            domain: None,
            website: None,
            email: None,
            is_auto_generated: false,
            members: Vec::new(),
            policies: PolicySet::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Workspace {
    pub fn member(&self, subject: &SubjectId) -> Option<&Member> {
        self.members.iter().find(|m| &m.subject == subject)
    }

    pub fn member_mut(&mut self, subject: &SubjectId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| &m.subject == subject)
    }

    /// Remove a member, returning it when present
    pub fn remove_member(&mut self, subject: &SubjectId) -> Option<Member> {
        let index = self.members.iter().position(|m| &m.subject == subject)?;
        Some(self.members.remove(index))
    }
}

/// Input for creating a new workspace
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateWorkspaceInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 255))]
    pub domain: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
}

/// Input for updating a workspace
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateWorkspaceInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub domain: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
}

/// Lower-case, hyphen-separated slug of a display name ("Really good org" -> "really-good-org")
pub fn make_slug(name: &str) -> String {
    NON_SLUG_CHARS
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

// Runs of characters that cannot appear in a slug
lazy_static::lazy_static! {
    static ref NON_SLUG_CHARS: regex::Regex = regex::Regex::new(r"[^a-z0-9]+").unwrap();
}
