//! Role catalog configuration
//!
//! The role hierarchy, the permissions each role grants on a workspace and
//! the table translating workspace permissions into dependent-resource
//! permissions. This is static configuration, loaded once at startup.

use crate::domain::{Permission, ResourceKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const ROLE_ADMINISTRATOR: &str = "Administrator";
pub const ROLE_DEVELOPER: &str = "Developer";
pub const ROLE_VIEWER: &str = "App Viewer";

/// Required to delete a workspace
pub const PERMISSION_MANAGE_WORKSPACE: &str = "manage:workspace";

/// A role and the roles it subsumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Directly subsumed roles, in order
    #[serde(default)]
    pub subsumes: Vec<String>,
    /// Workspace-kind permissions granted by this role alone
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Full catalog as read from JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCatalogConfig {
    pub roles: Vec<RoleDefinition>,
    /// Per dependent kind: workspace permission -> dependent permissions
    #[serde(default)]
    pub translations: BTreeMap<ResourceKind, BTreeMap<Permission, Vec<Permission>>>,
}

impl RoleCatalogConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid role catalog JSON")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read role catalog {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("Failed to parse role catalog {}", path.display()))
    }
}

fn perms(codes: &[&str]) -> Vec<Permission> {
    codes
        .iter()
        .map(|code| Permission::parse(code).expect("built-in permission code"))
        .collect()
}

impl Default for RoleCatalogConfig {
    /// Administrator ⊃ Developer ⊃ App Viewer
    fn default() -> Self {
        let manage_apps = Permission::parse("manage:workspace:applications")
            .expect("built-in permission code");
        let read_apps =
            Permission::parse("read:workspace:applications").expect("built-in permission code");

        let mut translations = BTreeMap::new();
        translations.insert(
            ResourceKind::Application,
            BTreeMap::from([
                (
                    manage_apps.clone(),
                    perms(&["manage:application", "read:application"]),
                ),
                (read_apps, perms(&["read:application"])),
            ]),
        );
        translations.insert(
            ResourceKind::Datasource,
            BTreeMap::from([(
                manage_apps,
                perms(&["manage:datasource", "read:datasource", "execute:datasource"]),
            )]),
        );

        Self {
            roles: vec![
                RoleDefinition {
                    name: ROLE_ADMINISTRATOR.to_string(),
                    description: "Can modify all settings including editing applications, \
                                  inviting other users to the workspace and exporting \
                                  applications from the workspace"
                        .to_string(),
                    subsumes: vec![ROLE_DEVELOPER.to_string()],
                    permissions: perms(&["manage:workspace", "invite:workspace"]),
                },
                RoleDefinition {
                    name: ROLE_DEVELOPER.to_string(),
                    description: "Can edit and view applications along with inviting other \
                                  users to the workspace"
                        .to_string(),
                    subsumes: vec![ROLE_VIEWER.to_string()],
                    permissions: perms(&["manage:workspace:applications"]),
                },
                RoleDefinition {
                    name: ROLE_VIEWER.to_string(),
                    description: "Can view applications and invite other users to view \
                                  applications"
                        .to_string(),
                    subsumes: vec![],
                    permissions: perms(&["read:workspace", "read:workspace:applications"]),
                },
            ],
            translations,
        }
    }
}
