//! User repository

use crate::domain::{EntityId, SubjectId, User};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// User records are shared by every workspace a subject belongs to, so the
/// membership index and the enabled flag are changed in place rather than by
/// read-modify-save.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<User>>;
    /// Placeholder account for an invited subject, pending activation.
    /// Fails with `Conflict` when the subject already has an account.
    async fn create_disabled_user(&self, subject: &SubjectId) -> Result<User>;
    /// Insert or replace
    async fn save(&self, user: &User) -> Result<User>;
    /// Record membership of `workspace_id`; `None` when the user does not exist
    async fn add_workspace(
        &self,
        subject: &SubjectId,
        workspace_id: EntityId,
    ) -> Result<Option<User>>;
    /// Drop membership of `workspace_id`; `None` when the user does not exist
    async fn remove_workspace(
        &self,
        subject: &SubjectId,
        workspace_id: EntityId,
    ) -> Result<Option<User>>;
    /// Set the enabled flag; `None` when the user does not exist
    async fn set_enabled(&self, subject: &SubjectId, enabled: bool) -> Result<Option<User>>;
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, subject: &SubjectId, change: F) -> Option<User>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users.write().await;
        let user = users.iter_mut().find(|u| &u.subject == subject)?;
        change(user);
        Some(user.clone())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_subject(&self, subject: &SubjectId) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| &u.subject == subject).cloned())
    }

    async fn create_disabled_user(&self, subject: &SubjectId) -> Result<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| &u.subject == subject) {
            return Err(AppError::Conflict(format!("User {} already exists", subject)));
        }
        let user = User::new(subject.clone(), false);
        users.push(user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<User> {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(stored) => *stored = user.clone(),
            None => users.push(user.clone()),
        }
        Ok(user.clone())
    }

    async fn add_workspace(
        &self,
        subject: &SubjectId,
        workspace_id: EntityId,
    ) -> Result<Option<User>> {
        Ok(self
            .update(subject, |user| {
                user.workspace_ids.insert(workspace_id);
            })
            .await)
    }

    async fn remove_workspace(
        &self,
        subject: &SubjectId,
        workspace_id: EntityId,
    ) -> Result<Option<User>> {
        Ok(self
            .update(subject, |user| {
                user.workspace_ids.remove(&workspace_id);
            })
            .await)
    }

    async fn set_enabled(&self, subject: &SubjectId, enabled: bool) -> Result<Option<User>> {
        Ok(self.update(subject, |user| user.enabled = enabled).await)
    }
}
