//! Policies attached to a resource
//!
//! A [`PolicySet`] maps each permission to the subjects holding it. It never
//! holds two entries for one permission and never keeps a permission whose
//! subject set became empty.

use super::permission::Permission;
use super::user::SubjectId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single (permission, subjects) binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub permission: Permission,
    pub subjects: BTreeSet<SubjectId>,
}

/// (permission, subject) pairs added and removed between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDelta {
    pub granted: BTreeSet<(Permission, SubjectId)>,
    pub revoked: BTreeSet<(Permission, SubjectId)>,
}

impl PolicyDelta {
    pub fn is_empty(&self) -> bool {
        self.granted.is_empty() && self.revoked.is_empty()
    }

    /// Subjects touched by this delta
    pub fn subjects(&self) -> BTreeSet<SubjectId> {
        self.granted
            .iter()
            .chain(self.revoked.iter())
            .map(|(_, subject)| subject.clone())
            .collect()
    }
}

/// Authoritative permission → subjects mapping of one resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Policy>", into = "Vec<Policy>")]
pub struct PolicySet {
    policies: BTreeMap<Permission, BTreeSet<SubjectId>>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `subject` to `permission`. Returns true when the set changed.
    pub fn grant(&mut self, permission: &Permission, subject: &SubjectId) -> bool {
        self.policies
            .entry(permission.clone())
            .or_default()
            .insert(subject.clone())
    }

    /// Remove `subject` from `permission`, dropping the policy once empty.
    /// Returns true when the set changed.
    pub fn revoke(&mut self, permission: &Permission, subject: &SubjectId) -> bool {
        let Some(subjects) = self.policies.get_mut(permission) else {
            return false;
        };
        let removed = subjects.remove(subject);
        if subjects.is_empty() {
            self.policies.remove(permission);
        }
        removed
    }

    /// Remove `subject` from every policy. Returns the number of policies touched.
    pub fn revoke_subject_everywhere(&mut self, subject: &SubjectId) -> usize {
        let mut touched = 0;
        self.policies.retain(|_, subjects| {
            if subjects.remove(subject) {
                touched += 1;
            }
            !subjects.is_empty()
        });
        touched
    }

    /// Pairs present in `new` but not in `old` are granted; the reverse are revoked.
    pub fn diff(old: &PolicySet, new: &PolicySet) -> PolicyDelta {
        let old_pairs = old.pairs();
        let new_pairs = new.pairs();
        PolicyDelta {
            granted: new_pairs.difference(&old_pairs).cloned().collect(),
            revoked: old_pairs.difference(&new_pairs).cloned().collect(),
        }
    }

    /// Apply a delta. Idempotent; returns true when anything changed.
    pub fn apply(&mut self, delta: &PolicyDelta) -> bool {
        let mut changed = false;
        for (permission, subject) in &delta.revoked {
            changed |= self.revoke(permission, subject);
        }
        for (permission, subject) in &delta.granted {
            changed |= self.grant(permission, subject);
        }
        changed
    }

    pub fn subjects(&self, permission: &Permission) -> Option<&BTreeSet<SubjectId>> {
        self.policies.get(permission)
    }

    pub fn contains(&self, permission: &Permission, subject: &SubjectId) -> bool {
        self.policies
            .get(permission)
            .is_some_and(|subjects| subjects.contains(subject))
    }

    /// Every permission `subject` holds in this set
    pub fn permissions_of(&self, subject: &SubjectId) -> BTreeSet<Permission> {
        self.policies
            .iter()
            .filter(|(_, subjects)| subjects.contains(subject))
            .map(|(permission, _)| permission.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Permission, &BTreeSet<SubjectId>)> {
        self.policies.iter()
    }

    /// Flattened (permission, subject) pairs
    pub fn pairs(&self) -> BTreeSet<(Permission, SubjectId)> {
        self.policies
            .iter()
            .flat_map(|(permission, subjects)| {
                subjects
                    .iter()
                    .map(move |subject| (permission.clone(), subject.clone()))
            })
            .collect()
    }

    pub fn to_policies(&self) -> Vec<Policy> {
        self.policies
            .iter()
            .map(|(permission, subjects)| Policy {
                permission: permission.clone(),
                subjects: subjects.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl FromIterator<(Permission, SubjectId)> for PolicySet {
    fn from_iter<I: IntoIterator<Item = (Permission, SubjectId)>>(iter: I) -> Self {
        let mut set = PolicySet::new();
        for (permission, subject) in iter {
            set.grant(&permission, &subject);
        }
        set
    }
}

// Policies for the same permission are merged; empty ones are dropped.
impl From<Vec<Policy>> for PolicySet {
    fn from(policies: Vec<Policy>) -> Self {
        policies
            .into_iter()
            .flat_map(|policy| {
                let permission = policy.permission;
                policy
                    .subjects
                    .into_iter()
                    .map(move |subject| (permission.clone(), subject))
            })
            .collect()
    }
}

impl From<PolicySet> for Vec<Policy> {
    fn from(set: PolicySet) -> Self {
        set.to_policies()
    }
}
