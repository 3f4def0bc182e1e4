//! Workspace membership business logic
//!
//! Every mutation runs under the workspace lock: load, recompute the
//! workspace policy set from the member list, save, then fan the change out to
//! dependents. Validation happens before anything is written. A failed
//! fan-out leaves the workspace saved and reports the unit to retry.
//!
//! User records span workspaces and are not covered by the workspace lock.
//! They are touched only after propagation, through the repository's atomic
//! link, unlink and enable operations.

use crate::config::PropagationConfig;
use crate::domain::{
    EntityId, InviteMembersInput, Member, PolicySet, PropagationUnit, SubjectId, User,
    Workspace,
};
use crate::error::{AppError, Result};
use crate::policy::AccessControl;
use crate::repository::{ResourceRepository, UserRepository, WorkspaceRepository};
use crate::service::lock::WorkspaceLocks;
use crate::service::propagation::{PropagationReport, ResourcePropagator};
use crate::telemetry::metrics::{result_label, MEMBERSHIP_OPERATIONS_TOTAL};
use metrics::counter;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

pub struct MembershipService<
    W: WorkspaceRepository,
    R: ResourceRepository + 'static,
    U: UserRepository,
> {
    workspace_repo: Arc<W>,
    user_repo: Arc<U>,
    access: Arc<AccessControl>,
    locks: Arc<WorkspaceLocks>,
    propagator: ResourcePropagator<R>,
}

fn parse_subject(raw: &str) -> Result<SubjectId> {
    SubjectId::parse(raw).map_err(AppError::InvalidParameter)
}

fn record(operation: &'static str, result: &'static str) {
    counter!(MEMBERSHIP_OPERATIONS_TOTAL, "operation" => operation, "result" => result)
        .increment(1);
}

/// Combine the fan-out and the user-record update that follow a saved
/// workspace change. A partial propagation wins, since it carries the unit to
/// retry.
fn settle(propagated: Result<PropagationReport>, users: Result<()>) -> Result<()> {
    match (propagated, users) {
        (Err(e), Err(user_error)) => {
            warn!(error = %user_error, "User record update failed after incomplete propagation");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(_), users) => users,
    }
}

impl<W: WorkspaceRepository, R: ResourceRepository + 'static, U: UserRepository>
    MembershipService<W, R, U>
{
    pub fn new(
        workspace_repo: Arc<W>,
        resource_repo: Arc<R>,
        user_repo: Arc<U>,
        access: Arc<AccessControl>,
        locks: Arc<WorkspaceLocks>,
        config: PropagationConfig,
    ) -> Self {
        Self {
            workspace_repo,
            user_repo,
            access,
            locks,
            propagator: ResourcePropagator::new(resource_repo, config),
        }
    }

    /// Add `subject` with `role`. Unknown subjects get a disabled placeholder
    /// account and join as invited. An existing member with a different role
    /// is moved to `role` as by [`Self::change_role`].
    pub async fn add_or_invite_member(
        &self,
        workspace_id: EntityId,
        subject: &str,
        role: &str,
    ) -> Result<Member> {
        let result = self.do_add_or_invite(workspace_id, subject, role).await;
        record("invite", result_label(&result));
        result
    }

    async fn do_add_or_invite(
        &self,
        workspace_id: EntityId,
        subject: &str,
        role: &str,
    ) -> Result<Member> {
        let subject = parse_subject(subject)?;
        self.access.validate_role(role)?;

        let _guard = self.locks.acquire(workspace_id).await;
        let mut workspace = self.load(workspace_id).await?;
        let old_policies = workspace.policies.clone();

        let added = self
            .stage_member(&mut workspace, &subject, role)
            .await?;
        let (saved, unit) = self
            .save_recomputed(workspace, &old_policies, BTreeSet::new())
            .await?;
        let propagated = self.propagator.propagate(&unit).await;
        let linked = if added {
            self.link_user(&subject, workspace_id).await
        } else {
            Ok(())
        };
        settle(propagated, linked)?;

        info!(%workspace_id, %subject, role, "Member added");
        self.member_of(&saved, &subject)
    }

    /// Bulk invite: one lock, one recompute and one propagation for the whole list
    pub async fn invite_members(&self, input: InviteMembersInput) -> Result<Vec<Member>> {
        let result = self.do_invite_members(input).await;
        record("bulk_invite", result_label(&result));
        result
    }

    async fn do_invite_members(&self, input: InviteMembersInput) -> Result<Vec<Member>> {
        input.validate()?;
        self.access.validate_role(&input.role_name)?;

        let mut subjects = Vec::with_capacity(input.subjects.len());
        for raw in &input.subjects {
            let subject = parse_subject(raw)?;
            if !subjects.contains(&subject) {
                subjects.push(subject);
            }
        }

        let workspace_id = input.workspace_id;
        let _guard = self.locks.acquire(workspace_id).await;
        let mut workspace = self.load(workspace_id).await?;
        let old_policies = workspace.policies.clone();

        let mut added = Vec::new();
        for subject in &subjects {
            if self
                .stage_member(&mut workspace, subject, &input.role_name)
                .await?
            {
                added.push(subject.clone());
            }
        }

        let (saved, unit) = self
            .save_recomputed(workspace, &old_policies, BTreeSet::new())
            .await?;
        let propagated = self.propagator.propagate(&unit).await;
        let mut linked = Ok(());
        for subject in &added {
            if let Err(e) = self.link_user(subject, workspace_id).await {
                warn!(%workspace_id, %subject, error = %e, "Failed to link invited user");
                if linked.is_ok() {
                    linked = Err(e);
                }
            }
        }
        settle(propagated, linked)?;

        info!(
            %workspace_id,
            role = %input.role_name,
            invited = subjects.len(),
            "Members invited"
        );
        subjects
            .iter()
            .map(|subject| self.member_of(&saved, subject))
            .collect()
    }

    /// Move a member to `new_role`, or remove it entirely with `None`.
    ///
    /// Removal strips the subject from every policy of the workspace and of
    /// every dependent. Returns the updated member, or `None` after removal.
    pub async fn change_role(
        &self,
        workspace_id: EntityId,
        subject: &str,
        new_role: Option<&str>,
    ) -> Result<Option<Member>> {
        let operation = if new_role.is_some() {
            "change_role"
        } else {
            "remove"
        };
        let result = self.do_change_role(workspace_id, subject, new_role).await;
        record(operation, result_label(&result));
        result
    }

    async fn do_change_role(
        &self,
        workspace_id: EntityId,
        subject: &str,
        new_role: Option<&str>,
    ) -> Result<Option<Member>> {
        let subject = parse_subject(subject)?;
        if let Some(role) = new_role {
            self.access.validate_role(role)?;
        }

        let _guard = self.locks.acquire(workspace_id).await;
        let mut workspace = self.load(workspace_id).await?;
        let old_policies = workspace.policies.clone();

        let Some(member) = workspace.member_mut(&subject) else {
            return Err(AppError::MemberNotFound {
                workspace_id,
                subject,
            });
        };

        match new_role {
            Some(role) => {
                if member.role == role {
                    return Ok(Some(member.clone()));
                }
                let previous = std::mem::replace(&mut member.role, role.to_string());
                let (saved, unit) = self
                    .save_recomputed(workspace, &old_policies, BTreeSet::new())
                    .await?;
                self.propagator.propagate(&unit).await?;
                info!(%workspace_id, %subject, from = %previous, to = role, "Member role changed");
                self.member_of(&saved, &subject).map(Some)
            }
            None => {
                workspace.remove_member(&subject);
                let (_, unit) = self
                    .save_recomputed(workspace, &old_policies, BTreeSet::from([subject.clone()]))
                    .await?;
                let propagated = self.propagator.propagate(&unit).await;
                let unlinked = self.unlink_user(&subject, workspace_id).await;
                settle(propagated, unlinked)?;
                info!(%workspace_id, %subject, "Member removed");
                Ok(None)
            }
        }
    }

    /// Members in insertion order, owner first
    pub async fn list_members(&self, workspace_id: EntityId) -> Result<Vec<Member>> {
        Ok(self.load(workspace_id).await?.members)
    }

    /// Turn an invited placeholder account into an active one and flip its
    /// member entries to enabled. Policies do not change.
    pub async fn activate_user(&self, subject: &str) -> Result<User> {
        let result = self.do_activate_user(subject).await;
        record("activate", result_label(&result));
        result
    }

    async fn do_activate_user(&self, subject: &str) -> Result<User> {
        let subject = parse_subject(subject)?;
        let not_found = || AppError::NotFound(format!("User {} not found", subject));
        let user = self
            .user_repo
            .find_by_subject(&subject)
            .await?
            .ok_or_else(not_found)?;
        if user.enabled {
            return Ok(user);
        }

        let user = self
            .user_repo
            .set_enabled(&subject, true)
            .await?
            .ok_or_else(not_found)?;

        for workspace_id in &user.workspace_ids {
            let _guard = self.locks.acquire(*workspace_id).await;
            let Some(mut workspace) = self.workspace_repo.find_by_id(*workspace_id).await? else {
                warn!(%workspace_id, %subject, "Workspace of activated user no longer exists");
                continue;
            };
            if let Some(member) = workspace.member_mut(&subject) {
                member.enabled = true;
                self.workspace_repo.save(&workspace).await?;
            }
        }

        info!(%subject, "User activated");
        Ok(user)
    }

    /// Re-apply a unit from a partial propagation failure.
    ///
    /// The unit is first narrowed to what the current member list still
    /// implies, so a stale retry cannot undo a later change.
    pub async fn retry_propagation(&self, unit: &PropagationUnit) -> Result<PropagationReport> {
        let result = self.do_retry_propagation(unit).await;
        record("retry", result_label(&result));
        result
    }

    async fn do_retry_propagation(&self, unit: &PropagationUnit) -> Result<PropagationReport> {
        let workspace_id = unit.workspace_id;
        let _guard = self.locks.acquire(workspace_id).await;
        let workspace = self.load(workspace_id).await?;

        let rebased = self.access.rebase(unit, &workspace);
        info!(%workspace_id, "Retrying propagation");
        self.propagator.propagate(&rebased).await
    }

    async fn load(&self, workspace_id: EntityId) -> Result<Workspace> {
        self.workspace_repo
            .find_by_id(workspace_id)
            .await?
            .ok_or(AppError::ContainerNotFound(workspace_id))
    }

    /// Put `subject` on the member list with `role`. Returns true when the
    /// subject was not a member before. Subjects without an account join as
    /// invited; their placeholder is created by [`Self::link_user`].
    async fn stage_member(
        &self,
        workspace: &mut Workspace,
        subject: &SubjectId,
        role: &str,
    ) -> Result<bool> {
        let workspace_id = workspace.id;
        if let Some(member) = workspace.member_mut(subject) {
            if member.role != role {
                warn!(
                    %workspace_id,
                    %subject,
                    from = %member.role,
                    to = role,
                    "Re-invite of existing member treated as role change"
                );
                member.role = role.to_string();
            }
            return Ok(false);
        }

        let enabled = self
            .user_repo
            .find_by_subject(subject)
            .await?
            .is_some_and(|user| user.enabled);
        workspace
            .members
            .push(Member::new(subject.clone(), role, enabled));
        Ok(true)
    }

    /// Recompute the policy set from the member list and save members and
    /// policies together. Nothing is written when the recompute fails.
    /// Returns the saved workspace and the unit still to be propagated.
    async fn save_recomputed(
        &self,
        mut workspace: Workspace,
        old_policies: &PolicySet,
        removed_subjects: BTreeSet<SubjectId>,
    ) -> Result<(Workspace, PropagationUnit)> {
        let new_policies = self.access.container_policies(&workspace.members)?;
        let unit = self
            .access
            .plan(workspace.id, old_policies, &new_policies, removed_subjects);

        workspace.policies = new_policies;
        let saved = self.workspace_repo.save(&workspace).await?;
        Ok((saved, unit))
    }

    /// Record the membership on the user, creating a disabled placeholder
    /// account first when the subject has none
    async fn link_user(&self, subject: &SubjectId, workspace_id: EntityId) -> Result<()> {
        if self
            .user_repo
            .add_workspace(subject, workspace_id)
            .await?
            .is_some()
        {
            return Ok(());
        }

        match self.user_repo.create_disabled_user(subject).await {
            Ok(_) => info!(%subject, "Placeholder user created"),
            // Created concurrently by an invite into another workspace
            Err(AppError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
        self.user_repo
            .add_workspace(subject, workspace_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", subject)))
    }

    async fn unlink_user(&self, subject: &SubjectId, workspace_id: EntityId) -> Result<()> {
        self.user_repo
            .remove_workspace(subject, workspace_id)
            .await
            .map(|_| ())
    }

    fn member_of(&self, workspace: &Workspace, subject: &SubjectId) -> Result<Member> {
        workspace
            .member(subject)
            .cloned()
            .ok_or_else(|| AppError::MemberNotFound {
                workspace_id: workspace.id,
                subject: subject.clone(),
            })
    }
}
