//! In-memory snapshot of existing directory state.
//!
//! Fetched once per run and kept in memory; applied creates are inserted so
//! later records in the same run observe them. Same-run numeric-id
//! collisions are caught through the claim cache, not through live
//! re-queries.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{PlanResult, SkipReason};

/// A person entry as it exists (or is planned to exist) in the directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Distinguished name, `uid=<identifier>,<people ou>`.
    pub dn: String,
    /// The login identifier; immutable once the entry exists.
    pub uid: String,
    /// Immutable once assigned.
    pub uid_number: i64,
    /// Immutable once assigned.
    pub gid_number: i64,

    pub cn: Option<String>,
    pub sn: Option<String>,
    pub given_name: Option<String>,
    pub display_name: Option<String>,
    /// Rank label, e.g. `"adm-cls 1"`.
    pub employee_type: Option<String>,

    pub home_directory: Option<String>,
    pub login_shell: Option<String>,

    /// Stored credential hash; compared only on explicit rotation.
    pub user_password: Option<String>,

    /// Normalized (lowercased, sorted, deduplicated) mail addresses.
    pub mail: Vec<String>,
    pub mail_alternate: Vec<String>,

    pub samba_sid: Option<String>,
    pub samba_primary_group_sid: Option<String>,
    pub samba_nt_password: Option<String>,
    pub samba_acct_flags: Option<String>,
    pub samba_pwd_last_set: Option<i64>,
}

/// A posixGroup entry with its memberUid set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub dn: String,
    pub name: String,
    pub gid_number: i64,
    pub member_uids: BTreeSet<String>,
}

impl GroupEntry {
    pub fn has_member(&self, uid: &str) -> bool {
        self.member_uids.contains(uid)
    }
}

/// Snapshot of directory state for one reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    entries: HashMap<String, DirectoryEntry>,
    groups: BTreeMap<String, GroupEntry>,
    gid_to_group: HashMap<i64, String>,
    /// uidNumber -> identifier that owns it, for same-run collision checks.
    claimed_uid_numbers: HashMap<i64, String>,
    /// Samba domain SID, when the directory carries a sambaDomain entry.
    pub domain_sid: Option<String>,
}

impl DirectorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing person entry. Its uidNumber is claimed by its uid.
    pub fn insert_entry(&mut self, entry: DirectoryEntry) {
        self.claimed_uid_numbers
            .insert(entry.uid_number, entry.uid.clone());
        self.entries.insert(entry.uid.clone(), entry);
    }

    /// Seed a group entry.
    pub fn insert_group(&mut self, group: GroupEntry) {
        self.gid_to_group.insert(group.gid_number, group.name.clone());
        self.groups.insert(group.name.clone(), group);
    }

    pub fn entry(&self, uid: &str) -> Option<&DirectoryEntry> {
        self.entries.get(uid)
    }

    pub fn group_by_name(&self, name: &str) -> Option<&GroupEntry> {
        self.groups.get(name)
    }

    pub fn group_by_gid(&self, gid: i64) -> Option<&GroupEntry> {
        self.gid_to_group.get(&gid).and_then(|n| self.groups.get(n))
    }

    pub fn entries(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupEntry> {
        self.groups.values()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Claim a uidNumber for an identifier within this run.
    ///
    /// Re-claiming by the same identifier is a no-op; a claim held by a
    /// different identifier is a collision skip.
    pub fn claim_uid_number(&mut self, uid_number: i64, uid: &str) -> PlanResult<()> {
        match self.claimed_uid_numbers.get(&uid_number) {
            Some(owner) if owner != uid => Err(SkipReason::NumericIdCollision {
                uid_number,
                claimed_by: owner.clone(),
            }),
            _ => {
                self.claimed_uid_numbers.insert(uid_number, uid.to_string());
                Ok(())
            }
        }
    }

    /// Record a planned create so later records in the run observe it.
    pub fn record_planned_create(&mut self, entry: DirectoryEntry) {
        self.insert_entry(entry);
    }

    /// Record a planned membership add so later records and the prune
    /// planner see the updated set.
    pub fn record_planned_member(&mut self, group_name: &str, uid: &str) {
        if let Some(group) = self.groups.get_mut(group_name) {
            group.member_uids.insert(uid.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(uid: &str, uid_number: i64) -> DirectoryEntry {
        DirectoryEntry {
            dn: format!("uid={uid},ou=Users,dc=example,dc=org"),
            uid: uid.into(),
            uid_number,
            gid_number: 2007,
            ..DirectoryEntry::default()
        }
    }

    #[test]
    fn seeded_entries_claim_their_uid_numbers() {
        let mut snap = DirectorySnapshot::new();
        snap.insert_entry(entry("tanaka-tarou", 70023));

        // Same identifier may re-claim.
        assert!(snap.claim_uid_number(70023, "tanaka-tarou").is_ok());

        // A different identifier may not.
        let err = snap.claim_uid_number(70023, "suzuki-ichirou").unwrap_err();
        assert_eq!(
            err,
            SkipReason::NumericIdCollision {
                uid_number: 70023,
                claimed_by: "tanaka-tarou".into()
            }
        );
    }

    #[test]
    fn planned_creates_are_visible_to_later_records() {
        let mut snap = DirectorySnapshot::new();
        assert!(snap.entry("tanaka-tarou").is_none());
        snap.record_planned_create(entry("tanaka-tarou", 70023));
        assert!(snap.entry("tanaka-tarou").is_some());
        assert!(snap.claim_uid_number(70023, "other").is_err());
    }

    #[test]
    fn group_lookup_by_name_and_gid() {
        let mut snap = DirectorySnapshot::new();
        snap.insert_group(GroupEntry {
            dn: "cn=adm-cls,ou=Groups,dc=example,dc=org".into(),
            name: "adm-cls".into(),
            gid_number: 3001,
            member_uids: BTreeSet::new(),
        });
        assert_eq!(snap.group_by_name("adm-cls").unwrap().gid_number, 3001);
        assert_eq!(snap.group_by_gid(3001).unwrap().name, "adm-cls");
        assert!(snap.group_by_name("missing").is_none());
    }
}
