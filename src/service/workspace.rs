//! Workspace business logic

use crate::config::roles::PERMISSION_MANAGE_WORKSPACE;
use crate::domain::{
    make_slug, CreateResourceInput, CreateWorkspaceInput, DependentResource, EntityId, Member,
    Permission, ResourceKind, SubjectId, UpdateWorkspaceInput, Workspace,
};
use crate::error::{AppError, Result};
use crate::policy::AccessControl;
use crate::repository::{ResourceRepository, UserRepository, WorkspaceRepository};
use crate::service::lock::WorkspaceLocks;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

pub struct WorkspaceService<W: WorkspaceRepository, R: ResourceRepository, U: UserRepository> {
    workspace_repo: Arc<W>,
    resource_repo: Arc<R>,
    user_repo: Arc<U>,
    access: Arc<AccessControl>,
    locks: Arc<WorkspaceLocks>,
}

fn parse_subject(raw: &str) -> Result<SubjectId> {
    SubjectId::parse(raw).map_err(AppError::InvalidParameter)
}

impl<W: WorkspaceRepository, R: ResourceRepository, U: UserRepository> WorkspaceService<W, R, U> {
    pub fn new(
        workspace_repo: Arc<W>,
        resource_repo: Arc<R>,
        user_repo: Arc<U>,
        access: Arc<AccessControl>,
        locks: Arc<WorkspaceLocks>,
    ) -> Self {
        Self {
            workspace_repo,
            resource_repo,
            user_repo,
            access,
            locks,
        }
    }

    /// Create a workspace owned by `owner`, who becomes its first member
    /// with the top role
    pub async fn create(&self, input: CreateWorkspaceInput, owner: &str) -> Result<Workspace> {
        self.create_workspace(input, owner, false).await
    }

    /// Personal workspace named after the owner ("alice's apps")
    pub async fn create_default(&self, owner: &str) -> Result<Workspace> {
        let subject = parse_subject(owner)?;
        let input = CreateWorkspaceInput {
            name: format!("{}'s apps", subject.local_part()),
            ..Default::default()
        };
        self.create_workspace(input, owner, true).await
    }

    async fn create_workspace(
        &self,
        input: CreateWorkspaceInput,
        owner: &str,
        is_auto_generated: bool,
    ) -> Result<Workspace> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidParameter(
                "Workspace name is required".to_string(),
            ));
        }
        input.validate()?;
        let owner = parse_subject(owner)?;

        let user = self
            .user_repo
            .find_by_subject(&owner)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", owner)))?;

        let members = vec![Member::new(
            owner.clone(),
            self.access.top_role(),
            user.enabled,
        )];
        let policies = self.access.container_policies(&members)?;
        let now = Utc::now();
        let workspace = Workspace {
            id: EntityId::new_v4(),
            slug: make_slug(&name),
            name,
            domain: input.domain,
            website: input.website,
            email: Some(owner.clone()),
            is_auto_generated,
            members,
            policies,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        let created = self.workspace_repo.create(&workspace).await?;
        self.user_repo.add_workspace(&owner, created.id).await?;

        info!(workspace_id = %created.id, slug = %created.slug, %owner, "Workspace created");
        Ok(created)
    }

    pub async fn get(&self, id: EntityId) -> Result<Workspace> {
        self.workspace_repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::ContainerNotFound(id))
    }

    /// Update descriptive fields. The slug follows the name; policies are untouched.
    pub async fn update(&self, id: EntityId, input: UpdateWorkspaceInput) -> Result<Workspace> {
        if let Some(name) = &input.name {
            if name.trim().is_empty() {
                return Err(AppError::InvalidParameter(
                    "Workspace name must not be empty".to_string(),
                ));
            }
        }
        input.validate()?;

        let _guard = self.locks.acquire(id).await;
        let mut workspace = self.get(id).await?;
        if let Some(name) = input.name {
            let name = name.trim().to_string();
            workspace.slug = make_slug(&name);
            workspace.name = name;
        }
        if let Some(domain) = input.domain {
            workspace.domain = Some(domain);
        }
        if let Some(website) = input.website {
            workspace.website = Some(website);
        }

        self.workspace_repo.save(&workspace).await
    }

    /// Delete a workspace that owns no dependents. `actor` must hold
    /// `manage:workspace`.
    pub async fn delete(&self, id: EntityId, actor: &str) -> Result<()> {
        let actor = parse_subject(actor)?;
        let manage = Permission::parse(PERMISSION_MANAGE_WORKSPACE)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

        let _guard = self.locks.acquire(id).await;
        let workspace = self.get(id).await?;
        AccessControl::require_permission(&workspace.policies, &actor, &manage)?;

        let dependents = self.resource_repo.count_by_workspace(id).await?;
        if dependents > 0 {
            return Err(AppError::UnsupportedOperation(format!(
                "Workspace {} still owns {} dependent resources",
                id, dependents
            )));
        }

        self.workspace_repo.delete(id).await?;
        for member in &workspace.members {
            self.user_repo.remove_workspace(&member.subject, id).await?;
        }

        info!(workspace_id = %id, %actor, "Workspace deleted");
        Ok(())
    }

    /// Role name → description for every role `actor` may assign
    pub async fn assignable_roles(
        &self,
        id: EntityId,
        actor: &str,
    ) -> Result<BTreeMap<String, String>> {
        let actor = parse_subject(actor)?;
        let workspace = self.get(id).await?;
        let member = workspace
            .member(&actor)
            .ok_or_else(|| AppError::MemberNotFound {
                workspace_id: id,
                subject: actor.clone(),
            })?;
        self.access.assignable_roles(&member.role)
    }

    /// Attach a new application or datasource. Its policies are derived from
    /// the current workspace policy set.
    pub async fn add_dependent(
        &self,
        id: EntityId,
        input: CreateResourceInput,
    ) -> Result<DependentResource> {
        input.validate()?;
        if input.kind == ResourceKind::Workspace {
            return Err(AppError::InvalidParameter(
                "A workspace cannot be a dependent resource".to_string(),
            ));
        }

        let _guard = self.locks.acquire(id).await;
        let workspace = self.get(id).await?;
        let now = Utc::now();
        let resource = DependentResource {
            id: EntityId::new_v4(),
            workspace_id: id,
            kind: input.kind,
            name: input.name,
            policies: self
                .access
                .dependent_policies(&workspace.policies, input.kind),
            created_at: now,
            updated_at: now,
        };

        let saved = self.resource_repo.save(&resource).await?;
        info!(workspace_id = %id, resource = %saved.reference(), "Dependent added");
        Ok(saved)
    }

    /// Every application and datasource of the workspace
    pub async fn dependents(&self, id: EntityId) -> Result<Vec<DependentResource>> {
        let mut dependents = Vec::new();
        for kind in ResourceKind::DEPENDENTS {
            dependents.extend(self.resource_repo.find_by_workspace(id, kind).await?);
        }
        Ok(dependents)
    }

    /// Workspaces in which `subject` holds `permission`
    pub async fn list_accessible(&self, subject: &str, permission: &str) -> Result<Vec<Workspace>> {
        let subject = parse_subject(subject)?;
        let permission = Permission::parse(permission).map_err(AppError::InvalidParameter)?;
        self.workspace_repo
            .find_accessible(&subject, &permission)
            .await
    }

    /// Dependents on which `subject` holds `permission`
    pub async fn list_accessible_resources(
        &self,
        subject: &str,
        permission: &str,
    ) -> Result<Vec<DependentResource>> {
        let subject = parse_subject(subject)?;
        let permission = Permission::parse(permission).map_err(AppError::InvalidParameter)?;
        self.resource_repo
            .find_accessible(&subject, &permission)
            .await
    }
}
