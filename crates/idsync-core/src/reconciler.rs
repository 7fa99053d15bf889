//! End-to-end reconciliation planning.
//!
//! Takes the source records and a directory snapshot and produces the full
//! run plan: per-record identifier, numeric ids, classification, desired
//! entry, write plan, and membership adds. Planning is pure apart from
//! credential salts; execution lives in the directory connector.
//!
//! Records are processed in `(company_id, user_id)` order so collisions
//! resolve deterministically: the lower key wins the claim, the higher key
//! is skipped.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify::{classify, parse_rank, BusinessGroups, ClassTable, Classification};
use crate::credential::{locked_credential, prepare_credential};
use crate::error::SkipReason;
use crate::identifier::{derive_identifier, Identifier};
use crate::membership::{plan_membership, MembershipOp};
use crate::numeric::{assign_numeric_ids, NumericIds};
use crate::plan::{plan_write, WritePlan};
use crate::record::SourceRecord;
use crate::snapshot::{DirectoryEntry, DirectorySnapshot};

/// Environment-level rules for a reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileRules {
    /// Full DN of the people OU, e.g. `ou=Users,dc=example,dc=org`.
    pub people_base: String,
    /// Full DN of the groups OU.
    pub groups_base: String,
    pub class_table: ClassTable,
    pub business_groups: BusinessGroups,
    /// Primary mail domain; the identifier becomes the local part.
    pub primary_mail_domain: Option<String>,
    /// Additional domains the primary address is mirrored into.
    pub extra_mail_domains: Vec<String>,
    pub default_login_shell: String,
    /// Base path for derived home directories.
    pub home_base: String,
    /// Rewrite credential attributes on existing entries.
    pub rotate_credentials: bool,
}

impl ReconcileRules {
    pub fn person_dn(&self, uid: &str) -> String {
        format!("uid={uid},{}", self.people_base)
    }
}

/// The complete plan for one accepted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPlan {
    pub identifier: Identifier,
    pub ids: NumericIds,
    pub classification: Option<Classification>,
    pub business_group: String,
    /// Full desired attribute set; the executor uses it both for creates
    /// and as the fallback when an update finds the entry missing.
    pub desired: DirectoryEntry,
    pub write: WritePlan,
    pub memberships: Vec<MembershipOp>,
}

/// One source record's planning result.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRecord {
    pub company_id: u32,
    pub user_id: u32,
    pub plan: Result<RecordPlan, SkipReason>,
}

/// The whole run's plan, in processing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunPlan {
    pub items: Vec<PlannedRecord>,
}

impl RunPlan {
    pub fn accepted(&self) -> impl Iterator<Item = (&PlannedRecord, &RecordPlan)> {
        self.items
            .iter()
            .filter_map(|item| item.plan.as_ref().ok().map(|plan| (item, plan)))
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&PlannedRecord, &SkipReason)> {
        self.items
            .iter()
            .filter_map(|item| item.plan.as_ref().err().map(|reason| (item, reason)))
    }
}

pub struct Reconciler {
    rules: ReconcileRules,
}

impl Reconciler {
    pub fn new(rules: ReconcileRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ReconcileRules {
        &self.rules
    }

    /// Plan the run. The snapshot is mutated as planning proceeds: planned
    /// creates and membership adds become visible to later records, so a
    /// duplicate identifier or uidNumber later in the batch is caught here
    /// rather than at the directory.
    pub fn plan(
        &self,
        mut records: Vec<SourceRecord>,
        snapshot: &mut DirectorySnapshot,
        now_epoch: i64,
    ) -> RunPlan {
        records.sort_by_key(SourceRecord::key);

        let mut run = RunPlan::default();
        for record in records {
            let (company_id, user_id) = record.key();
            let plan = self.plan_record(&record, snapshot, now_epoch);
            if let Err(reason) = &plan {
                debug!(
                    company_id,
                    user_id,
                    code = reason.code(),
                    "record skipped: {reason}"
                );
            }
            run.items.push(PlannedRecord {
                company_id,
                user_id,
                plan,
            });
        }
        run
    }

    fn plan_record(
        &self,
        record: &SourceRecord,
        snapshot: &mut DirectorySnapshot,
        now_epoch: i64,
    ) -> Result<RecordPlan, SkipReason> {
        if !record.active {
            return Err(SkipReason::Inactive);
        }

        let identifier = derive_identifier(record)?;
        let existing = snapshot.entry(identifier.as_str()).cloned();
        let ids = assign_numeric_ids(record, existing.as_ref())?;
        snapshot.claim_uid_number(ids.uid_number, identifier.as_str())?;

        let classification = classify(
            &self.rules.class_table,
            record.employee_type.as_deref(),
            record.level_id,
            record.business_group.as_deref(),
        );
        if let Some(c) = &classification {
            if c.level_out_of_range {
                warn!(
                    company_id = record.company_id,
                    user_id = record.user_id,
                    class = %c.name,
                    level = c.level,
                    "rank level outside the class range; accepted as-is"
                );
            }
        }
        let (business_group, _) = self.rules.business_groups.resolve(record.business_group.as_deref());

        let desired = self.desired_entry(
            record,
            &identifier,
            &ids,
            classification.as_ref(),
            existing.as_ref(),
            snapshot.domain_sid.as_deref(),
            now_epoch,
        );
        let write = plan_write(&desired, existing.as_ref(), self.rules.rotate_credentials)?;

        // Everyone belongs to the default group, plus their business group
        // and rank class.
        let mut target_groups = vec!["users".to_string()];
        if business_group != "users" {
            target_groups.push(business_group.clone());
        }
        if let Some(c) = &classification {
            if c.name != business_group {
                target_groups.push(c.name.clone());
            }
        }
        let memberships = plan_membership(snapshot, identifier.as_str(), &target_groups);

        // Make the planned state visible to the rest of the run.
        if matches!(write, WritePlan::Create { .. }) {
            snapshot.record_planned_create(desired.clone());
        }
        for op in &memberships {
            if let MembershipOp::Add { group, uid } = op {
                snapshot.record_planned_member(group, uid);
            }
        }

        Ok(RecordPlan {
            identifier,
            ids,
            classification,
            business_group,
            desired,
            write,
            memberships,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn desired_entry(
        &self,
        record: &SourceRecord,
        identifier: &Identifier,
        ids: &NumericIds,
        classification: Option<&Classification>,
        existing: Option<&DirectoryEntry>,
        domain_sid: Option<&str>,
        now_epoch: i64,
    ) -> DirectoryEntry {
        let uid = identifier.as_str();
        let full_name = format!("{} {}", record.family_name.trim(), record.given_name.trim())
            .trim()
            .to_string();
        let cn = if full_name.is_empty() {
            uid.to_string()
        } else {
            full_name
        };

        let mut entry = DirectoryEntry {
            dn: self.rules.person_dn(uid),
            uid: uid.to_string(),
            uid_number: ids.uid_number,
            gid_number: ids.gid_number,
            cn: Some(cn.clone()),
            sn: Some(nonempty_or(&record.family_name, uid)),
            given_name: nonempty(&record.given_name),
            display_name: Some(cn),
            employee_type: classification.map(Classification::label),
            home_directory: Some(
                record
                    .home_directory
                    .clone()
                    .filter(|h| !h.trim().is_empty())
                    .unwrap_or_else(|| {
                        // /home/07-023-tanaka-tarou: sorts by company then
                        // user on disk.
                        format!(
                            "{}/{:02}-{:03}-{uid}",
                            self.rules.home_base, record.company_id, record.user_id
                        )
                    }),
            ),
            login_shell: Some(
                record
                    .login_shell
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| self.rules.default_login_shell.clone()),
            ),
            ..DirectoryEntry::default()
        };

        entry.mail = self.mail_addresses(uid, &record.alternate_mail);
        entry.mail_alternate = normalize_addresses(&record.alternate_mail);

        if let Some(domain) = domain_sid {
            entry.samba_sid = Some(format!("{domain}-{}", ids.uid_number));
            entry.samba_primary_group_sid = Some(format!("{domain}-{}", ids.gid_number));
            entry.samba_acct_flags = Some("[U          ]".to_string());
        }

        // Credentials are prepared only where a write could carry them:
        // on create, or on explicit rotation.
        if existing.is_none() || self.rules.rotate_credentials {
            match record.credential.as_deref().filter(|c| !c.is_empty()) {
                Some(raw) => {
                    let prepared = prepare_credential(raw);
                    entry.user_password = Some(prepared.user_password);
                    if domain_sid.is_some() {
                        entry.samba_nt_password = prepared.nt_password;
                        if entry.samba_nt_password.is_some() {
                            entry.samba_pwd_last_set = Some(now_epoch);
                        }
                    }
                }
                // No source credential: a brand-new entry gets an unusable
                // filler; an existing entry keeps its stored hash untouched,
                // even under rotation.
                None => {
                    if existing.is_none() {
                        entry.user_password = Some(locked_credential());
                    }
                }
            }
        }

        entry
    }

    fn mail_addresses(&self, uid: &str, alternates: &[String]) -> Vec<String> {
        let mut addrs = Vec::new();
        if let Some(primary) = &self.rules.primary_mail_domain {
            addrs.push(format!("{uid}@{primary}"));
        }
        for domain in &self.rules.extra_mail_domains {
            addrs.push(format!("{uid}@{domain}"));
        }
        addrs.extend(alternates.iter().cloned());
        normalize_addresses(&addrs)
    }

    /// Desired `memberUid` sets derived from directory state, for the
    /// standalone group-sync pass. Class groups are fully recomputed from
    /// each entry's rank label. Business membership is authoritative from
    /// person sync (the source knows the assignment), so here a business
    /// group keeps its current members as long as their person entry still
    /// exists, plus anyone whose primary gidNumber points at it.
    pub fn desired_group_membership(
        &self,
        snapshot: &DirectorySnapshot,
    ) -> BTreeMap<String, BTreeSet<String>> {
        let mut desired: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (name, _) in self.rules.business_groups.iter() {
            desired.entry(name.to_string()).or_default();
        }
        for def in self.rules.class_table.defs() {
            desired.entry(def.name.clone()).or_default();
        }

        for entry in snapshot.entries() {
            // Everyone belongs to the default group.
            desired
                .entry("users".to_string())
                .or_default()
                .insert(entry.uid.clone());

            if let Some(name) = self.rules.business_groups.name_for(entry.gid_number) {
                desired
                    .entry(name.to_string())
                    .or_default()
                    .insert(entry.uid.clone());
            }

            if let Some(def) = entry
                .employee_type
                .as_deref()
                .and_then(parse_rank)
                .and_then(|(name, _)| self.rules.class_table.find_by_name(&name))
            {
                desired
                    .entry(def.name.clone())
                    .or_default()
                    .insert(entry.uid.clone());
            }
        }

        for group in snapshot.groups() {
            if self.rules.business_groups.gid_for(&group.name).is_none() {
                continue;
            }
            if let Some(set) = desired.get_mut(&group.name) {
                for uid in &group.member_uids {
                    if snapshot.entry(uid).is_some() {
                        set.insert(uid.clone());
                    }
                }
            }
        }
        desired
    }
}

fn nonempty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn nonempty_or(value: &str, fallback: &str) -> String {
    nonempty(value).unwrap_or_else(|| fallback.to_string())
}

/// Lowercase, deduplicate, and sort mail addresses.
fn normalize_addresses(addresses: &[String]) -> Vec<String> {
    let mut out: Vec<String> = addresses
        .iter()
        .map(|a| a.trim().to_lowercase())
        .filter(|a| !a.is_empty())
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}
