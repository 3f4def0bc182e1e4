//! Resources scoped to a workspace (applications, datasources)

use super::common::EntityId;
use super::permission::ResourceKind;
use super::policy::PolicySet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Resource whose policies are derived from its owning workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependentResource {
    pub id: EntityId,
    pub workspace_id: EntityId,
    pub kind: ResourceKind,
    pub name: String,
    pub policies: PolicySet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DependentResource {
    pub fn reference(&self) -> ResourceRef {
        ResourceRef {
            id: self.id,
            kind: self.kind,
        }
    }
}

/// Identifies a dependent resource without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub id: EntityId,
    pub kind: ResourceKind,
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Input for attaching a new dependent to a workspace
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateResourceInput {
    pub kind: ResourceKind,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_ref_display() {
        let id = EntityId(uuid::Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap());
        let reference = ResourceRef {
            id,
            kind: ResourceKind::Datasource,
        };
        assert_eq!(
            reference.to_string(),
            "datasource/550e8400-e29b-41d4-a716-446655440000"
        );
    }

    #[test]
    fn test_create_resource_input_validation() {
        let input = CreateResourceInput {
            kind: ResourceKind::Application,
            name: String::new(),
        };
        assert!(input.validate().is_err());
    }
}
