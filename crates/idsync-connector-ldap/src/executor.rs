//! Applies a planned run to the directory.
//!
//! Writes are idempotent at the protocol level: replacing an attribute with
//! the value it already has, re-adding an existing memberUid (code 20), and
//! deleting an absent one (code 16) all converge without error. An update
//! that finds its entry gone (code 32) falls back to creating it from the
//! full desired attribute set.

use std::collections::HashSet;

use ldap3::Mod;
use tracing::{debug, info, warn};

use idsync_core::membership::{GroupDelta, MembershipOp};
use idsync_core::plan::WritePlan;
use idsync_core::reconciler::RecordPlan;
use idsync_core::report::PlanAction;
use idsync_core::snapshot::DirectoryEntry;

use crate::connector::{escape_dn_value, DirectoryClient};
use crate::error::{DirectoryError, DirectoryResult};

const RC_NO_SUCH_ATTRIBUTE: u32 = 16;
const RC_ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
const RC_NO_SUCH_OBJECT: u32 = 32;

/// Result of applying one record's plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedRecord {
    pub action: PlanAction,
    pub membership_adds: u64,
    pub unresolved_groups: u64,
}

/// Executes planned writes against a bound directory client.
pub struct Executor<'a> {
    client: &'a mut DirectoryClient,
    groups_base: String,
}

impl<'a> Executor<'a> {
    pub fn new(client: &'a mut DirectoryClient) -> Self {
        let groups_base = client.config().groups_base();
        Self {
            client,
            groups_base,
        }
    }

    /// Apply one record's write and membership adds.
    pub async fn apply_record(&mut self, plan: &RecordPlan) -> DirectoryResult<AppliedRecord> {
        let action = match &plan.write {
            WritePlan::NoOp { dn } => {
                debug!(dn = %dn, "entry already converged");
                PlanAction::NoOp
            }
            WritePlan::Create { dn } => {
                self.create_entry(dn, &plan.desired).await?;
                info!(dn = %dn, uid_number = plan.desired.uid_number, "entry created");
                PlanAction::Create
            }
            WritePlan::Update { dn, changes } => {
                let mods: Vec<Mod<String>> = changes
                    .iter()
                    .map(|c| {
                        Mod::Replace(
                            c.attribute.clone(),
                            c.values.iter().cloned().collect::<HashSet<_>>(),
                        )
                    })
                    .collect();
                let result = self.client.connection().await?.modify(dn, mods).await?;
                if result.rc == RC_NO_SUCH_OBJECT {
                    // The entry vanished since the snapshot; create it whole.
                    warn!(dn = %dn, "entry disappeared before update; creating instead");
                    self.create_entry(dn, &plan.desired).await?;
                    PlanAction::Create
                } else {
                    check_write(dn, result)?;
                    info!(dn = %dn, attributes = changes.len(), "entry updated");
                    PlanAction::Update
                }
            }
        };

        let mut membership_adds = 0;
        let mut unresolved_groups = 0;
        for op in &plan.memberships {
            match op {
                MembershipOp::Add { group, uid } => {
                    if self.add_member(group, uid).await? {
                        membership_adds += 1;
                    }
                }
                MembershipOp::AlreadyMember { .. } => {}
                MembershipOp::UnresolvedGroup { group, uid } => {
                    warn!(group = %group, uid = %uid, "target group does not exist; skipped");
                    unresolved_groups += 1;
                }
            }
        }

        Ok(AppliedRecord {
            action,
            membership_adds,
            unresolved_groups,
        })
    }

    /// Apply one group's membership delta. Returns `(adds, removes)`
    /// actually written.
    pub async fn apply_group_delta(&mut self, delta: &GroupDelta) -> DirectoryResult<(u64, u64)> {
        let dn = self.group_dn(&delta.group);
        let mut adds = 0;
        let mut removes = 0;
        for uid in &delta.add {
            if self.modify_member(&dn, uid, true).await? {
                adds += 1;
            }
        }
        for uid in &delta.remove {
            if self.modify_member(&dn, uid, false).await? {
                removes += 1;
            }
        }
        if adds > 0 || removes > 0 {
            info!(group = %delta.group, adds, removes, "group membership updated");
        }
        Ok((adds, removes))
    }

    fn group_dn(&self, name: &str) -> String {
        format!("cn={},{}", escape_dn_value(name), self.groups_base)
    }

    async fn add_member(&mut self, group: &str, uid: &str) -> DirectoryResult<bool> {
        let dn = self.group_dn(group);
        self.modify_member(&dn, uid, true).await
    }

    /// Add or remove one memberUid. Returns whether the directory changed.
    async fn modify_member(&mut self, dn: &str, uid: &str, add: bool) -> DirectoryResult<bool> {
        let values: HashSet<String> = std::iter::once(uid.to_string()).collect();
        let mods = vec![if add {
            Mod::Add("memberUid".to_string(), values)
        } else {
            Mod::Delete("memberUid".to_string(), values)
        }];
        let result = self.client.connection().await?.modify(dn, mods).await?;
        match result.rc {
            0 => Ok(true),
            // Another writer got there first; the desired state holds.
            RC_ATTRIBUTE_OR_VALUE_EXISTS if add => Ok(false),
            RC_NO_SUCH_ATTRIBUTE if !add => Ok(false),
            _ => Err(write_error(dn, result)),
        }
    }

    async fn create_entry(&mut self, dn: &str, desired: &DirectoryEntry) -> DirectoryResult<()> {
        let attrs = entry_to_add_attrs(desired);
        let result = self.client.connection().await?.add(dn, attrs).await?;
        check_write(dn, result)
    }
}

fn check_write(dn: &str, result: ldap3::LdapResult) -> DirectoryResult<()> {
    match result.rc {
        0 => Ok(()),
        RC_NO_SUCH_OBJECT => Err(DirectoryError::NotFound { dn: dn.to_string() }),
        code => Err(DirectoryError::WriteFailed {
            dn: dn.to_string(),
            code,
            message: result.text,
        }),
    }
}

fn write_error(dn: &str, result: ldap3::LdapResult) -> DirectoryError {
    DirectoryError::WriteFailed {
        dn: dn.to_string(),
        code: result.rc,
        message: result.text,
    }
}

/// Full attribute set for an add operation.
fn entry_to_add_attrs(entry: &DirectoryEntry) -> Vec<(String, HashSet<String>)> {
    let mut attrs: Vec<(String, HashSet<String>)> = Vec::new();
    let mut push_single = |name: &str, value: &str| {
        attrs.push((
            name.to_string(),
            std::iter::once(value.to_string()).collect(),
        ));
    };

    let mut object_classes = vec![
        "top",
        "person",
        "organizationalPerson",
        "inetOrgPerson",
        "posixAccount",
        "shadowAccount",
    ];
    if entry.samba_sid.is_some() {
        object_classes.push("sambaSamAccount");
    }

    push_single("uid", &entry.uid);
    push_single("uidNumber", &entry.uid_number.to_string());
    push_single("gidNumber", &entry.gid_number.to_string());
    for (name, value) in [
        ("cn", &entry.cn),
        ("sn", &entry.sn),
        ("givenName", &entry.given_name),
        ("displayName", &entry.display_name),
        ("employeeType", &entry.employee_type),
        ("homeDirectory", &entry.home_directory),
        ("loginShell", &entry.login_shell),
        ("userPassword", &entry.user_password),
        ("sambaSID", &entry.samba_sid),
        ("sambaPrimaryGroupSID", &entry.samba_primary_group_sid),
        ("sambaNTPassword", &entry.samba_nt_password),
        ("sambaAcctFlags", &entry.samba_acct_flags),
    ] {
        if let Some(v) = value {
            push_single(name, v);
        }
    }
    if let Some(ts) = entry.samba_pwd_last_set {
        push_single("sambaPwdLastSet", &ts.to_string());
    }
    if !entry.mail.is_empty() {
        attrs.push(("mail".to_string(), entry.mail.iter().cloned().collect()));
    }
    if !entry.mail_alternate.is_empty() {
        attrs.push((
            "mailAlternateAddress".to_string(),
            entry.mail_alternate.iter().cloned().collect(),
        ));
    }
    attrs.push((
        "objectClass".to_string(),
        object_classes.into_iter().map(String::from).collect(),
    ));
    attrs
}
