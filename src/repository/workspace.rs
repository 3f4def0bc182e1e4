//! Workspace repository

use crate::domain::{EntityId, Permission, SubjectId, Workspace};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    async fn find_by_id(&self, id: EntityId) -> Result<Option<Workspace>>;
    async fn create(&self, workspace: &Workspace) -> Result<Workspace>;
    /// Persist members and policies together. Fails with `Conflict` when the
    /// stored version differs from `workspace.version`; returns the saved copy
    /// with its version bumped.
    async fn save(&self, workspace: &Workspace) -> Result<Workspace>;
    async fn delete(&self, id: EntityId) -> Result<()>;
    /// Workspaces where `subject` holds `permission`
    async fn find_accessible(
        &self,
        subject: &SubjectId,
        permission: &Permission,
    ) -> Result<Vec<Workspace>>;
}

/// Process-local store, kept in creation order
#[derive(Default)]
pub struct InMemoryWorkspaceRepository {
    workspaces: RwLock<Vec<Workspace>>,
}

impl InMemoryWorkspaceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkspaceRepository for InMemoryWorkspaceRepository {
    async fn find_by_id(&self, id: EntityId) -> Result<Option<Workspace>> {
        let workspaces = self.workspaces.read().await;
        Ok(workspaces.iter().find(|w| w.id == id).cloned())
    }

    async fn create(&self, workspace: &Workspace) -> Result<Workspace> {
        let mut workspaces = self.workspaces.write().await;
        if workspaces.iter().any(|w| w.id == workspace.id) {
            return Err(AppError::Conflict(format!(
                "Workspace {} already exists",
                workspace.id
            )));
        }
        let mut created = workspace.clone();
        created.version = 1;
        workspaces.push(created.clone());
        Ok(created)
    }

    async fn save(&self, workspace: &Workspace) -> Result<Workspace> {
        let mut workspaces = self.workspaces.write().await;
        let stored = workspaces
            .iter_mut()
            .find(|w| w.id == workspace.id)
            .ok_or(AppError::ContainerNotFound(workspace.id))?;

        if stored.version != workspace.version {
            return Err(AppError::Conflict(format!(
                "Workspace {} was modified concurrently (expected version {}, found {})",
                workspace.id, workspace.version, stored.version
            )));
        }

        let mut saved = workspace.clone();
        saved.version += 1;
        saved.updated_at = Utc::now();
        *stored = saved.clone();
        Ok(saved)
    }

    async fn delete(&self, id: EntityId) -> Result<()> {
        let mut workspaces = self.workspaces.write().await;
        let before = workspaces.len();
        workspaces.retain(|w| w.id != id);
        if workspaces.len() == before {
            return Err(AppError::ContainerNotFound(id));
        }
        Ok(())
    }

    async fn find_accessible(
        &self,
        subject: &SubjectId,
        permission: &Permission,
    ) -> Result<Vec<Workspace>> {
        let workspaces = self.workspaces.read().await;
        Ok(workspaces
            .iter()
            .filter(|w| w.policies.contains(permission, subject))
            .cloned()
            .collect())
    }
}
