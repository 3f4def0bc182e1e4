//! Permission catalog: role grants and the workspace → dependent translation table

use crate::config::RoleCatalogConfig;
use crate::domain::{Permission, PolicySet, ResourceKind};
use crate::error::{AppError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Static mapping from roles to permissions, per resource kind
#[derive(Debug, Clone, Default)]
pub struct PermissionCatalog {
    role_permissions: BTreeMap<String, BTreeSet<Permission>>,
    translations: BTreeMap<ResourceKind, BTreeMap<Permission, BTreeSet<Permission>>>,
}

fn kind_of(permission: &Permission) -> Result<ResourceKind> {
    permission.kind().map_err(AppError::Configuration)
}

impl PermissionCatalog {
    /// Build and validate the catalog. Role names are checked by the role graph.
    pub fn from_config(config: &RoleCatalogConfig) -> Result<Self> {
        let mut role_permissions = BTreeMap::new();
        for role in &config.roles {
            let mut granted = BTreeSet::new();
            for permission in &role.permissions {
                if kind_of(permission)? != ResourceKind::Workspace {
                    return Err(AppError::Configuration(format!(
                        "Role '{}' grants '{}', which is not a workspace permission",
                        role.name, permission
                    )));
                }
                granted.insert(permission.clone());
            }
            role_permissions.insert(role.name.clone(), granted);
        }

        let mut translations = BTreeMap::new();
        for (kind, table) in &config.translations {
            if *kind == ResourceKind::Workspace {
                return Err(AppError::Configuration(
                    "Translations target dependent kinds only".to_string(),
                ));
            }
            let mut entries = BTreeMap::new();
            for (source, targets) in table {
                if kind_of(source)? != ResourceKind::Workspace {
                    return Err(AppError::Configuration(format!(
                        "Translation source '{}' is not a workspace permission",
                        source
                    )));
                }
                for target in targets {
                    if kind_of(target)? != *kind {
                        return Err(AppError::Configuration(format!(
                            "Translation target '{}' does not belong to kind '{}'",
                            target, kind
                        )));
                    }
                }
                entries.insert(source.clone(), targets.iter().cloned().collect());
            }
            translations.insert(*kind, entries);
        }

        Ok(Self {
            role_permissions,
            translations,
        })
    }

    /// Permissions granted directly by one role on the workspace
    pub fn role_permissions(&self, role: &str) -> Option<&BTreeSet<Permission>> {
        self.role_permissions.get(role)
    }

    /// Union of the grants of every role in an already-expanded set, scoped to `kind`.
    /// Unknown role names are rejected rather than skipped.
    pub fn permissions_for(
        &self,
        expanded_roles: &BTreeSet<String>,
        kind: ResourceKind,
    ) -> Result<BTreeSet<Permission>> {
        let mut workspace_permissions = BTreeSet::new();
        for role in expanded_roles {
            let granted = self
                .role_permissions
                .get(role)
                .ok_or_else(|| AppError::UnknownRole(role.clone()))?;
            workspace_permissions.extend(granted.iter().cloned());
        }

        if kind == ResourceKind::Workspace {
            return Ok(workspace_permissions);
        }
        Ok(workspace_permissions
            .iter()
            .flat_map(|permission| self.translate(permission, kind))
            .collect())
    }

    /// Dependent permissions a workspace permission maps to; empty when unmapped
    pub fn translate(&self, permission: &Permission, kind: ResourceKind) -> BTreeSet<Permission> {
        if kind == ResourceKind::Workspace {
            return BTreeSet::from([permission.clone()]);
        }
        self.translations
            .get(&kind)
            .and_then(|table| table.get(permission))
            .cloned()
            .unwrap_or_default()
    }

    /// Policy set a dependent of `kind` derives from the workspace policy set
    pub fn translate_policies(&self, container: &PolicySet, kind: ResourceKind) -> PolicySet {
        if kind == ResourceKind::Workspace {
            return container.clone();
        }
        let mut translated = PolicySet::new();
        for (permission, subjects) in container.iter() {
            for target in self.translate(permission, kind) {
                for subject in subjects {
                    translated.grant(&target, subject);
                }
            }
        }
        translated
    }

    /// The translation table for one dependent kind
    pub fn translations(&self, kind: ResourceKind) -> Option<&BTreeMap<Permission, BTreeSet<Permission>>> {
        self.translations.get(&kind)
    }
}
