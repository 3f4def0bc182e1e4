//! Static access model for workspaces and their dependents.
//!
//! [`AccessControl`] bundles the role graph and the permission catalog. Both
//! are read-only once built, so a single instance is shared behind an `Arc`
//! by every service without locking.

pub mod catalog;
pub mod role_graph;

pub use catalog::PermissionCatalog;
pub use role_graph::RoleGraph;

use crate::config::RoleCatalogConfig;
use crate::domain::{
    EntityId, Member, Permission, PolicyDelta, PolicySet, PropagationUnit, ResourceKind,
    SubjectId, Workspace,
};
use crate::error::{AppError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

lazy_static::lazy_static! {
    static ref BUILTIN: Arc<AccessControl> = Arc::new(
        AccessControl::from_config(&RoleCatalogConfig::default())
            .expect("built-in role catalog is valid"),
    );
}

#[derive(Debug, Clone)]
pub struct AccessControl {
    graph: RoleGraph,
    catalog: PermissionCatalog,
}

impl AccessControl {
    /// Validate a role catalog and build the access model from it
    pub fn from_config(config: &RoleCatalogConfig) -> Result<Self> {
        let graph = RoleGraph::from_definitions(&config.roles)?;
        let catalog = PermissionCatalog::from_config(config)?;
        Ok(Self { graph, catalog })
    }

    /// Shared instance of the built-in Administrator / Developer / App Viewer model
    pub fn builtin() -> Arc<AccessControl> {
        BUILTIN.clone()
    }

    pub fn graph(&self) -> &RoleGraph {
        &self.graph
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    pub fn expand(&self, role: &str) -> Result<BTreeSet<String>> {
        self.graph.expand(role)
    }

    /// Role given to the creator of a workspace
    pub fn top_role(&self) -> &str {
        self.graph.top_role()
    }

    pub fn validate_role(&self, role: &str) -> Result<()> {
        if role.trim().is_empty() {
            return Err(AppError::InvalidParameter(
                "Role name is required".to_string(),
            ));
        }
        if !self.graph.contains(role) {
            return Err(AppError::UnknownRole(role.to_string()));
        }
        Ok(())
    }

    /// Permissions a single role grants on `kind`
    pub fn permissions_for_role(&self, role: &str, kind: ResourceKind) -> Result<BTreeSet<Permission>> {
        let expanded = self.graph.expand(role)?;
        self.catalog.permissions_for(&expanded, kind)
    }

    /// Workspace policy set derived from the member list, invited members included
    pub fn container_policies(&self, members: &[Member]) -> Result<PolicySet> {
        let mut policies = PolicySet::new();
        for member in members {
            for permission in self.permissions_for_role(&member.role, ResourceKind::Workspace)? {
                policies.grant(&permission, &member.subject);
            }
        }
        Ok(policies)
    }

    /// Policy set a new dependent of `kind` starts with
    pub fn dependent_policies(&self, container: &PolicySet, kind: ResourceKind) -> PolicySet {
        self.catalog.translate_policies(container, kind)
    }

    /// Deltas that move the workspace and its dependents from `old` to `new`.
    ///
    /// Dependent deltas compare translated snapshots rather than translating
    /// the container delta, so a dependent permission that is still implied by
    /// some remaining workspace permission is never revoked.
    pub fn plan(
        &self,
        workspace_id: EntityId,
        old: &PolicySet,
        new: &PolicySet,
        removed_subjects: BTreeSet<SubjectId>,
    ) -> PropagationUnit {
        let mut unit = PropagationUnit::empty(workspace_id);
        unit.container = PolicySet::diff(old, new);
        for kind in ResourceKind::DEPENDENTS {
            let delta = PolicySet::diff(
                &self.catalog.translate_policies(old, kind),
                &self.catalog.translate_policies(new, kind),
            );
            if !delta.is_empty() {
                unit.dependents.insert(kind, delta);
            }
        }
        unit.removed_subjects = removed_subjects;
        unit
    }

    /// Restrict a recorded unit to what still holds for `current`, so that
    /// re-applying an old unit never undoes a later membership change.
    pub fn rebase(&self, unit: &PropagationUnit, current: &Workspace) -> PropagationUnit {
        let mut rebased = PropagationUnit::empty(unit.workspace_id);
        rebased.container = unit.container.clone();
        for (kind, delta) in &unit.dependents {
            let target = self.catalog.translate_policies(&current.policies, *kind);
            let delta = PolicyDelta {
                granted: delta
                    .granted
                    .iter()
                    .filter(|(p, s)| target.contains(p, s))
                    .cloned()
                    .collect(),
                revoked: delta
                    .revoked
                    .iter()
                    .filter(|(p, s)| !target.contains(p, s))
                    .cloned()
                    .collect(),
            };
            if !delta.is_empty() {
                rebased.dependents.insert(*kind, delta);
            }
        }
        rebased.removed_subjects = unit
            .removed_subjects
            .iter()
            .filter(|subject| current.member(subject).is_none())
            .cloned()
            .collect();
        rebased
    }

    /// Roles a holder of `role` may hand out, with their descriptions
    pub fn assignable_roles(&self, role: &str) -> Result<BTreeMap<String, String>> {
        Ok(self
            .graph
            .expand(role)?
            .into_iter()
            .map(|name| {
                let description = self.graph.description(&name).unwrap_or_default().to_string();
                (name, description)
            })
            .collect())
    }

    pub fn require_permission(
        policies: &PolicySet,
        subject: &SubjectId,
        permission: &Permission,
    ) -> Result<()> {
        if policies.contains(permission, subject) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{} does not hold '{}'",
                subject, permission
            )))
        }
    }
}
