//! Idempotent write planning.
//!
//! Compares the desired entry against the directory snapshot and emits the
//! minimal set of attribute replacements. Attributes the source no longer
//! supplies are left alone, never cleared. Credential attributes are
//! compared only when rotation is requested. An unchanged entry plans as
//! `NoOp`, so a second run over the same source is all no-ops.

use serde::{Deserialize, Serialize};

use crate::error::{PlanResult, SkipReason};
use crate::snapshot::DirectoryEntry;

/// One attribute replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub attribute: String,
    pub values: Vec<String>,
}

impl AttributeChange {
    fn single(attribute: &str, value: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            values: vec![value.to_string()],
        }
    }

    fn multi(attribute: &str, values: &[String]) -> Self {
        Self {
            attribute: attribute.to_string(),
            values: values.to_vec(),
        }
    }
}

/// The planned directory write for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WritePlan {
    /// The entry does not exist; add it with the full desired attribute set.
    Create { dn: String },
    /// The entry exists; replace exactly these attributes.
    Update {
        dn: String,
        changes: Vec<AttributeChange>,
    },
    /// The entry exists and already matches.
    NoOp { dn: String },
}

impl WritePlan {
    pub fn dn(&self) -> &str {
        match self {
            WritePlan::Create { dn } | WritePlan::Update { dn, .. } | WritePlan::NoOp { dn } => dn,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, WritePlan::NoOp { .. })
    }
}

/// Plan the write for a desired entry against the existing one.
pub fn plan_write(
    desired: &DirectoryEntry,
    existing: Option<&DirectoryEntry>,
    rotate_credential: bool,
) -> PlanResult<WritePlan> {
    let Some(existing) = existing else {
        return Ok(WritePlan::Create {
            dn: desired.dn.clone(),
        });
    };

    // Upstream resolution reuses existing ids; this guard is the last line
    // before a write would mutate an immutable id.
    if existing.uid_number != desired.uid_number {
        return Err(SkipReason::ImmutableIdViolation {
            uid: existing.uid.clone(),
            existing: existing.uid_number,
            desired: desired.uid_number,
        });
    }
    if existing.gid_number != desired.gid_number {
        return Err(SkipReason::ImmutableIdViolation {
            uid: existing.uid.clone(),
            existing: existing.gid_number,
            desired: desired.gid_number,
        });
    }

    let mut changes = Vec::new();
    diff_scalar(&mut changes, "cn", &desired.cn, &existing.cn);
    diff_scalar(&mut changes, "sn", &desired.sn, &existing.sn);
    diff_scalar(&mut changes, "givenName", &desired.given_name, &existing.given_name);
    diff_scalar(
        &mut changes,
        "displayName",
        &desired.display_name,
        &existing.display_name,
    );
    diff_scalar(
        &mut changes,
        "employeeType",
        &desired.employee_type,
        &existing.employee_type,
    );
    diff_scalar(
        &mut changes,
        "homeDirectory",
        &desired.home_directory,
        &existing.home_directory,
    );
    diff_scalar(
        &mut changes,
        "loginShell",
        &desired.login_shell,
        &existing.login_shell,
    );
    diff_multi(&mut changes, "mail", &desired.mail, &existing.mail);
    diff_multi(
        &mut changes,
        "mailAlternateAddress",
        &desired.mail_alternate,
        &existing.mail_alternate,
    );
    diff_scalar(&mut changes, "sambaSID", &desired.samba_sid, &existing.samba_sid);
    diff_scalar(
        &mut changes,
        "sambaPrimaryGroupSID",
        &desired.samba_primary_group_sid,
        &existing.samba_primary_group_sid,
    );
    diff_scalar(
        &mut changes,
        "sambaAcctFlags",
        &desired.samba_acct_flags,
        &existing.samba_acct_flags,
    );

    if rotate_credential {
        diff_scalar(
            &mut changes,
            "userPassword",
            &desired.user_password,
            &existing.user_password,
        );
        diff_scalar(
            &mut changes,
            "sambaNTPassword",
            &desired.samba_nt_password,
            &existing.samba_nt_password,
        );
        if let Some(ts) = desired.samba_pwd_last_set {
            if desired.samba_nt_password != existing.samba_nt_password
                || desired.user_password != existing.user_password
            {
                changes.push(AttributeChange::single("sambaPwdLastSet", &ts.to_string()));
            }
        }
    }

    if changes.is_empty() {
        Ok(WritePlan::NoOp {
            dn: existing.dn.clone(),
        })
    } else {
        Ok(WritePlan::Update {
            dn: existing.dn.clone(),
            changes,
        })
    }
}

/// Replace when the desired value is present and differs. A missing desired
/// value never clears the stored one.
fn diff_scalar(
    changes: &mut Vec<AttributeChange>,
    attribute: &str,
    desired: &Option<String>,
    existing: &Option<String>,
) {
    if let Some(want) = desired {
        if existing.as_deref() != Some(want.as_str()) {
            changes.push(AttributeChange::single(attribute, want));
        }
    }
}

/// Replace when the desired set is non-empty and differs as a set.
fn diff_multi(
    changes: &mut Vec<AttributeChange>,
    attribute: &str,
    desired: &[String],
    existing: &[String],
) {
    if desired.is_empty() {
        return;
    }
    let mut want: Vec<&str> = desired.iter().map(String::as_str).collect();
    let mut have: Vec<&str> = existing.iter().map(String::as_str).collect();
    want.sort_unstable();
    want.dedup();
    have.sort_unstable();
    have.dedup();
    if want != have {
        changes.push(AttributeChange::multi(attribute, desired));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> DirectoryEntry {
        DirectoryEntry {
            dn: "uid=tanaka-tarou,ou=Users,dc=example,dc=org".into(),
            uid: "tanaka-tarou".into(),
            uid_number: 70023,
            gid_number: 2007,
            cn: Some("Tanaka Tarou".into()),
            sn: Some("Tanaka".into()),
            given_name: Some("Tarou".into()),
            display_name: Some("Tanaka Tarou".into()),
            employee_type: Some("stf-cls 15".into()),
            home_directory: Some("/home/tanaka-tarou".into()),
            login_shell: Some("/bin/bash".into()),
            mail: vec!["tanaka-tarou@example.org".into()],
            ..DirectoryEntry::default()
        }
    }

    #[test]
    fn missing_entry_plans_a_create() {
        let desired = entry();
        let plan = plan_write(&desired, None, false).unwrap();
        assert_eq!(
            plan,
            WritePlan::Create {
                dn: desired.dn.clone()
            }
        );
    }

    #[test]
    fn identical_entry_plans_a_noop() {
        let desired = entry();
        let existing = entry();
        let plan = plan_write(&desired, Some(&existing), false).unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn only_changed_attributes_are_replaced() {
        let mut desired = entry();
        desired.employee_type = Some("mgr-cls 5".into());
        desired.login_shell = Some("/bin/zsh".into());
        let existing = entry();

        let plan = plan_write(&desired, Some(&existing), false).unwrap();
        let WritePlan::Update { changes, .. } = plan else {
            panic!("expected update");
        };
        assert_eq!(changes.len(), 2);
        assert!(changes
            .iter()
            .any(|c| c.attribute == "employeeType" && c.values == ["mgr-cls 5"]));
        assert!(changes
            .iter()
            .any(|c| c.attribute == "loginShell" && c.values == ["/bin/zsh"]));
    }

    #[test]
    fn absent_desired_values_never_clear() {
        let mut desired = entry();
        desired.employee_type = None;
        desired.mail = Vec::new();
        let existing = entry();

        let plan = plan_write(&desired, Some(&existing), false).unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn mail_compares_as_a_set() {
        let mut desired = entry();
        desired.mail = vec![
            "tanaka-tarou@alt.example.org".into(),
            "tanaka-tarou@example.org".into(),
        ];
        let mut existing = entry();
        existing.mail = vec![
            "tanaka-tarou@example.org".into(),
            "tanaka-tarou@alt.example.org".into(),
        ];
        assert!(plan_write(&desired, Some(&existing), false)
            .unwrap()
            .is_noop());

        existing.mail = vec!["tanaka-tarou@example.org".into()];
        let plan = plan_write(&desired, Some(&existing), false).unwrap();
        assert!(matches!(plan, WritePlan::Update { .. }));
    }

    #[test]
    fn credentials_compare_only_on_rotation() {
        let mut desired = entry();
        desired.user_password = Some("{SSHA}new".into());
        let mut existing = entry();
        existing.user_password = Some("{SSHA}old".into());

        assert!(plan_write(&desired, Some(&existing), false)
            .unwrap()
            .is_noop());

        let plan = plan_write(&desired, Some(&existing), true).unwrap();
        let WritePlan::Update { changes, .. } = plan else {
            panic!("expected update");
        };
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].attribute, "userPassword");
    }

    #[test]
    fn rotation_stamps_pwd_last_set_with_the_hash() {
        let mut desired = entry();
        desired.samba_nt_password = Some("AABB".into());
        desired.samba_pwd_last_set = Some(1_700_000_000);
        let mut existing = entry();
        existing.samba_nt_password = Some("CCDD".into());

        let plan = plan_write(&desired, Some(&existing), true).unwrap();
        let WritePlan::Update { changes, .. } = plan else {
            panic!("expected update");
        };
        assert!(changes.iter().any(|c| c.attribute == "sambaNTPassword"));
        assert!(changes
            .iter()
            .any(|c| c.attribute == "sambaPwdLastSet" && c.values == ["1700000000"]));
    }

    #[test]
    fn changed_uid_number_is_refused() {
        let mut desired = entry();
        desired.uid_number = 70024;
        let existing = entry();
        assert_eq!(
            plan_write(&desired, Some(&existing), false),
            Err(SkipReason::ImmutableIdViolation {
                uid: "tanaka-tarou".into(),
                existing: 70023,
                desired: 70024
            })
        );
    }

    #[test]
    fn changed_gid_number_is_refused() {
        let mut desired = entry();
        desired.gid_number = 100;
        let existing = entry();
        assert!(matches!(
            plan_write(&desired, Some(&existing), false),
            Err(SkipReason::ImmutableIdViolation { .. })
        ));
    }
}
