//! Dependent resource repository (applications, datasources)

use crate::domain::{DependentResource, EntityId, Permission, ResourceKind, SubjectId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn find_by_id(&self, id: EntityId) -> Result<Option<DependentResource>>;
    async fn find_by_workspace(
        &self,
        workspace_id: EntityId,
        kind: ResourceKind,
    ) -> Result<Vec<DependentResource>>;
    async fn count_by_workspace(&self, workspace_id: EntityId) -> Result<i64>;
    /// Insert or replace
    async fn save(&self, resource: &DependentResource) -> Result<DependentResource>;
    async fn find_accessible(
        &self,
        subject: &SubjectId,
        permission: &Permission,
    ) -> Result<Vec<DependentResource>>;
}

#[derive(Default)]
pub struct InMemoryResourceRepository {
    resources: RwLock<Vec<DependentResource>>,
}

impl InMemoryResourceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceRepository for InMemoryResourceRepository {
    async fn find_by_id(&self, id: EntityId) -> Result<Option<DependentResource>> {
        let resources = self.resources.read().await;
        Ok(resources.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_workspace(
        &self,
        workspace_id: EntityId,
        kind: ResourceKind,
    ) -> Result<Vec<DependentResource>> {
        let resources = self.resources.read().await;
        Ok(resources
            .iter()
            .filter(|r| r.workspace_id == workspace_id && r.kind == kind)
            .cloned()
            .collect())
    }

    async fn count_by_workspace(&self, workspace_id: EntityId) -> Result<i64> {
        let resources = self.resources.read().await;
        Ok(resources
            .iter()
            .filter(|r| r.workspace_id == workspace_id)
            .count() as i64)
    }

    async fn save(&self, resource: &DependentResource) -> Result<DependentResource> {
        let mut resources = self.resources.write().await;
        let mut saved = resource.clone();
        saved.updated_at = Utc::now();
        match resources.iter_mut().find(|r| r.id == resource.id) {
            Some(stored) => *stored = saved.clone(),
            None => resources.push(saved.clone()),
        }
        Ok(saved)
    }

    async fn find_accessible(
        &self,
        subject: &SubjectId,
        permission: &Permission,
    ) -> Result<Vec<DependentResource>> {
        let resources = self.resources.read().await;
        Ok(resources
            .iter()
            .filter(|r| r.policies.contains(permission, subject))
            .cloned()
            .collect())
    }
}
