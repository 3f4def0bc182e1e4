//! Integration test infrastructure
//!
//! Services wired to in-memory repositories. The resource and user
//! repositories can be told to fail or stall so partial propagation and
//! user-record failures can be exercised.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use workspace_acl::config::PropagationConfig;
use workspace_acl::domain::{
    CreateResourceInput, CreateWorkspaceInput, DependentResource, EntityId, Permission,
    PolicySet, ResourceKind, SubjectId, User, Workspace,
};
use workspace_acl::error::{AppError, Result};
use workspace_acl::policy::AccessControl;
use workspace_acl::repository::{
    InMemoryResourceRepository, InMemoryUserRepository, InMemoryWorkspaceRepository,
    ResourceRepository, UserRepository, WorkspaceRepository,
};
use workspace_acl::service::{MembershipService, WorkspaceLocks, WorkspaceService};

// ============================================================================
// Helpers
// ============================================================================

pub fn perm(code: &str) -> Permission {
    Permission::parse(code).unwrap()
}

pub fn subject(id: &str) -> SubjectId {
    SubjectId::parse(id).unwrap()
}

/// No policy in the set has an empty subject list
pub fn assert_no_empty_policies(policies: &PolicySet) {
    for (permission, subjects) in policies.iter() {
        assert!(!subjects.is_empty(), "policy {} has no subjects", permission);
    }
}

// ============================================================================
// Flaky Resource Repository
// ============================================================================

/// In-memory resource store whose writes can be made to fail or stall
#[derive(Default)]
pub struct FlakyResourceRepository {
    inner: InMemoryResourceRepository,
    failing: RwLock<HashSet<EntityId>>,
    save_delay: RwLock<Option<Duration>>,
    load_delay: RwLock<Option<Duration>>,
    saves: AtomicUsize,
}

impl FlakyResourceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_saves_for(&self, id: EntityId) {
        self.failing.write().await.insert(id);
    }

    pub async fn set_save_delay(&self, delay: Option<Duration>) {
        *self.save_delay.write().await = delay;
    }

    pub async fn set_load_delay(&self, delay: Option<Duration>) {
        *self.load_delay.write().await = delay;
    }

    /// Clear injected failures and delays
    pub async fn heal(&self) {
        self.failing.write().await.clear();
        *self.save_delay.write().await = None;
        *self.load_delay.write().await = None;
    }

    /// Successful saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceRepository for FlakyResourceRepository {
    async fn find_by_id(&self, id: EntityId) -> Result<Option<DependentResource>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_workspace(
        &self,
        workspace_id: EntityId,
        kind: ResourceKind,
    ) -> Result<Vec<DependentResource>> {
        let delay = *self.load_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.find_by_workspace(workspace_id, kind).await
    }

    async fn count_by_workspace(&self, workspace_id: EntityId) -> Result<i64> {
        self.inner.count_by_workspace(workspace_id).await
    }

    async fn save(&self, resource: &DependentResource) -> Result<DependentResource> {
        let delay = *self.save_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.read().await.contains(&resource.id) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "simulated write failure for {}",
                resource.id
            )));
        }
        let saved = self.inner.save(resource).await?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(saved)
    }

    async fn find_accessible(
        &self,
        subject: &SubjectId,
        permission: &Permission,
    ) -> Result<Vec<DependentResource>> {
        self.inner.find_accessible(subject, permission).await
    }
}

// ============================================================================
// Flaky User Repository
// ============================================================================

/// In-memory user store whose writes can be made to fail or stall
#[derive(Default)]
pub struct FlakyUserRepository {
    inner: InMemoryUserRepository,
    failing: AtomicBool,
    delay: RwLock<Option<Duration>>,
}

impl FlakyUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every call, widening the window between concurrent operations
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    async fn before_call(&self, write: bool) -> Result<()> {
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if write && self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow::anyhow!("simulated user store failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for FlakyUserRepository {
    async fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<User>> {
        self.before_call(false).await?;
        self.inner.find_by_subject(subject).await
    }

    async fn create_disabled_user(&self, subject: &SubjectId) -> Result<User> {
        self.before_call(true).await?;
        self.inner.create_disabled_user(subject).await
    }

    async fn save(&self, user: &User) -> Result<User> {
        self.before_call(true).await?;
        self.inner.save(user).await
    }

    async fn add_workspace(
        &self,
        subject: &SubjectId,
        workspace_id: EntityId,
    ) -> Result<Option<User>> {
        self.before_call(true).await?;
        self.inner.add_workspace(subject, workspace_id).await
    }

    async fn remove_workspace(
        &self,
        subject: &SubjectId,
        workspace_id: EntityId,
    ) -> Result<Option<User>> {
        self.before_call(true).await?;
        self.inner.remove_workspace(subject, workspace_id).await
    }

    async fn set_enabled(&self, subject: &SubjectId, enabled: bool) -> Result<Option<User>> {
        self.before_call(true).await?;
        self.inner.set_enabled(subject, enabled).await
    }
}

// ============================================================================
// Test Services Builder
// ============================================================================

pub type TestMembershipService =
    MembershipService<InMemoryWorkspaceRepository, FlakyResourceRepository, FlakyUserRepository>;
pub type TestWorkspaceService =
    WorkspaceService<InMemoryWorkspaceRepository, FlakyResourceRepository, FlakyUserRepository>;

pub struct TestServicesBuilder {
    pub workspace_repo: Arc<InMemoryWorkspaceRepository>,
    pub resource_repo: Arc<FlakyResourceRepository>,
    pub user_repo: Arc<FlakyUserRepository>,
    pub access: Arc<AccessControl>,
    pub locks: Arc<WorkspaceLocks>,
    pub propagation: PropagationConfig,
}

impl Default for TestServicesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestServicesBuilder {
    pub fn new() -> Self {
        Self {
            workspace_repo: Arc::new(InMemoryWorkspaceRepository::new()),
            resource_repo: Arc::new(FlakyResourceRepository::new()),
            user_repo: Arc::new(FlakyUserRepository::new()),
            access: AccessControl::builtin(),
            locks: Arc::new(WorkspaceLocks::new()),
            propagation: PropagationConfig::default(),
        }
    }

    pub fn with_access(mut self, access: AccessControl) -> Self {
        self.access = Arc::new(access);
        self
    }

    pub fn with_propagation_timeout(mut self, timeout: Duration) -> Self {
        self.propagation.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn build_membership_service(&self) -> TestMembershipService {
        MembershipService::new(
            self.workspace_repo.clone(),
            self.resource_repo.clone(),
            self.user_repo.clone(),
            self.access.clone(),
            self.locks.clone(),
            self.propagation.clone(),
        )
    }

    pub fn build_workspace_service(&self) -> TestWorkspaceService {
        WorkspaceService::new(
            self.workspace_repo.clone(),
            self.resource_repo.clone(),
            self.user_repo.clone(),
            self.access.clone(),
            self.locks.clone(),
        )
    }

    pub async fn seed_user(&self, id: &str, enabled: bool) -> User {
        self.user_repo
            .save(&User::new(subject(id), enabled))
            .await
            .unwrap()
    }

    pub async fn user(&self, id: &str) -> Option<User> {
        self.user_repo.find_by_subject(&subject(id)).await.unwrap()
    }

    /// Workspace named "Test Workspace" owned by an existing, enabled `owner`
    pub async fn create_workspace(&self, owner: &str) -> Workspace {
        if self.user(owner).await.is_none() {
            self.seed_user(owner, true).await;
        }
        self.build_workspace_service()
            .create(
                CreateWorkspaceInput {
                    name: "Test Workspace".to_string(),
                    ..Default::default()
                },
                owner,
            )
            .await
            .unwrap()
    }

    pub async fn add_dependent(&self, workspace_id: EntityId, kind: ResourceKind) -> DependentResource {
        self.build_workspace_service()
            .add_dependent(
                workspace_id,
                CreateResourceInput {
                    kind,
                    name: format!("test {}", kind),
                },
            )
            .await
            .unwrap()
    }

    pub async fn workspace(&self, id: EntityId) -> Workspace {
        self.workspace_repo.find_by_id(id).await.unwrap().unwrap()
    }

    pub async fn resource(&self, id: EntityId) -> DependentResource {
        self.resource_repo.find_by_id(id).await.unwrap().unwrap()
    }
}
