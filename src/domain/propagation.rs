//! Propagation unit: the recorded deltas of one membership mutation

use super::common::EntityId;
use super::permission::ResourceKind;
use super::policy::{PolicyDelta, PolicySet};
use super::user::SubjectId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Everything needed to bring a workspace's dependents in line with one
/// container change. Applying a unit twice has the same effect as once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationUnit {
    pub workspace_id: EntityId,
    /// Change to the workspace's own policy set
    pub container: PolicyDelta,
    /// Translated change per dependent kind
    pub dependents: BTreeMap<ResourceKind, PolicyDelta>,
    /// Subjects to strip from every dependent policy
    pub removed_subjects: BTreeSet<SubjectId>,
}

impl PropagationUnit {
    pub fn empty(workspace_id: EntityId) -> Self {
        Self {
            workspace_id,
            container: PolicyDelta::default(),
            dependents: BTreeMap::new(),
            removed_subjects: BTreeSet::new(),
        }
    }

    /// True when no dependent needs to be touched
    pub fn is_noop(&self) -> bool {
        self.removed_subjects.is_empty() && self.dependents.values().all(PolicyDelta::is_empty)
    }

    /// Apply this unit to the policy set of a dependent of `kind`
    pub fn apply_to(&self, kind: ResourceKind, policies: &mut PolicySet) -> bool {
        let mut changed = self
            .dependents
            .get(&kind)
            .is_some_and(|delta| policies.apply(delta));
        for subject in &self.removed_subjects {
            changed |= policies.revoke_subject_everywhere(subject) > 0;
        }
        changed
    }
}
