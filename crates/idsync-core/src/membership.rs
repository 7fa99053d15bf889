//! Group membership planning over `memberUid` sets.
//!
//! Groups are provisioned out of band; the planner only adjusts membership.
//! A group name that does not resolve in the snapshot is reported, never
//! created. Removals happen only through the explicit prune path.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::snapshot::DirectorySnapshot;

/// Per-record membership outcome for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipOp {
    /// The identifier must be added to the group's memberUid set.
    Add { group: String, uid: String },
    /// Already present; nothing to write.
    AlreadyMember { group: String, uid: String },
    /// The group does not exist in the directory.
    UnresolvedGroup { group: String, uid: String },
}

impl MembershipOp {
    pub fn group(&self) -> &str {
        match self {
            MembershipOp::Add { group, .. }
            | MembershipOp::AlreadyMember { group, .. }
            | MembershipOp::UnresolvedGroup { group, .. } => group,
        }
    }

    pub fn is_add(&self) -> bool {
        matches!(self, MembershipOp::Add { .. })
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, MembershipOp::UnresolvedGroup { .. })
    }
}

/// Plan the membership adds for one identifier across its target groups.
pub fn plan_membership(
    snapshot: &DirectorySnapshot,
    uid: &str,
    groups: &[String],
) -> Vec<MembershipOp> {
    groups
        .iter()
        .map(|name| match snapshot.group_by_name(name) {
            Some(group) if group.has_member(uid) => MembershipOp::AlreadyMember {
                group: name.clone(),
                uid: uid.to_string(),
            },
            Some(_) => MembershipOp::Add {
                group: name.clone(),
                uid: uid.to_string(),
            },
            None => MembershipOp::UnresolvedGroup {
                group: name.clone(),
                uid: uid.to_string(),
            },
        })
        .collect()
}

/// Net membership change for one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDelta {
    pub group: String,
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl GroupDelta {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Diff desired membership sets against the snapshot.
///
/// Removals are computed only when `prune` is set; groups absent from the
/// desired map keep their members either way.
pub fn diff_membership(
    snapshot: &DirectorySnapshot,
    desired: &BTreeMap<String, BTreeSet<String>>,
    prune: bool,
) -> Vec<GroupDelta> {
    let mut deltas = Vec::new();
    for (name, want) in desired {
        let Some(group) = snapshot.group_by_name(name) else {
            continue;
        };
        let add: Vec<String> = want
            .iter()
            .filter(|uid| !group.has_member(uid))
            .cloned()
            .collect();
        let remove: Vec<String> = if prune {
            group
                .member_uids
                .iter()
                .filter(|uid| !want.contains(*uid))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        let delta = GroupDelta {
            group: name.clone(),
            add,
            remove,
        };
        if !delta.is_empty() {
            deltas.push(delta);
        }
    }
    deltas
}
