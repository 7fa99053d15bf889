//! End-to-end planning over a realistic batch: mixed creates, updates,
//! skips, and the convergence property that a second pass plans nothing.

use std::collections::BTreeSet;

use idsync_core::{
    diff_membership, BusinessGroups, ClassTable, DirectoryEntry, DirectorySnapshot, GroupEntry,
    PlanAction, ReconcileRules, Reconciler, RecordOutcome, RecordResult, RunReport, SkipReason,
    SourceRecord, WritePlan,
};

fn rules() -> ReconcileRules {
    ReconcileRules {
        people_base: "ou=Users,dc=example,dc=org".into(),
        groups_base: "ou=Groups,dc=example,dc=org".into(),
        class_table: ClassTable::canonical(),
        business_groups: BusinessGroups::canonical(),
        primary_mail_domain: Some("example.org".into()),
        extra_mail_domains: vec![],
        default_login_shell: "/bin/bash".into(),
        home_base: "/home".into(),
        rotate_credentials: false,
    }
}

fn snapshot() -> DirectorySnapshot {
    let mut snap = DirectorySnapshot::new();
    for (name, gid) in [
        ("users", 100),
        ("esmile-dev", 2001),
        ("adm-cls", 3001),
        ("stf-cls", 3020),
        ("err-cls", 3099),
    ] {
        snap.insert_group(GroupEntry {
            dn: format!("cn={name},ou=Groups,dc=example,dc=org"),
            name: name.into(),
            gid_number: gid,
            member_uids: BTreeSet::new(),
        });
    }
    snap
}

fn person(company_id: u32, user_id: u32, family: &str, given: &str) -> SourceRecord {
    let mut r = SourceRecord::new(company_id, user_id);
    r.family_kana = family.into();
    r.given_kana = given.into();
    r
}

fn batch() -> Vec<SourceRecord> {
    let mut tanaka = person(7, 23, "タナカ", "タロウ");
    tanaka.employee_type = Some("stf-cls 15".into());
    tanaka.business_group = Some("esmile-dev".into());

    let mut suzuki = person(7, 24, "スズキ", "イチロウ");
    suzuki.employee_type = Some("adm-cls-1".into());

    // No rank string; level 0 normalizes to the error class.
    let mut unranked = person(7, 25, "サトウ", "ハナコ");
    unranked.level_id = Some(0);

    let mut inactive = person(7, 26, "ヤマダ", "ジロウ");
    inactive.active = false;

    // No alias and no kana.
    let nameless = SourceRecord::new(7, 27);

    vec![tanaka, suzuki, unranked, inactive, nameless]
}

#[test]
fn first_pass_plans_creates_and_skips() {
    let reconciler = Reconciler::new(rules());
    let mut snap = snapshot();
    let run = reconciler.plan(batch(), &mut snap, 1_700_000_000);

    let tanaka = run.items[0].plan.as_ref().unwrap();
    assert_eq!(tanaka.identifier.as_str(), "tanaka-tarou");
    assert_eq!(tanaka.ids.uid_number, 70023);
    assert_eq!(tanaka.business_group, "esmile-dev");
    assert!(matches!(tanaka.write, WritePlan::Create { .. }));

    let suzuki = run.items[1].plan.as_ref().unwrap();
    assert_eq!(suzuki.identifier.as_str(), "suzuki-ichirou");
    assert_eq!(
        suzuki.desired.employee_type.as_deref(),
        Some("adm-cls 1")
    );

    let unranked = run.items[2].plan.as_ref().unwrap();
    assert_eq!(unranked.desired.employee_type.as_deref(), Some("err-cls 99"));

    assert_eq!(run.items[3].plan, Err(SkipReason::Inactive));
    assert_eq!(run.items[4].plan, Err(SkipReason::NoUsableIdentifier));

    assert_eq!(run.accepted().count(), 3);
    assert_eq!(run.skipped().count(), 2);
}

#[test]
fn second_pass_converges_to_noops() {
    let reconciler = Reconciler::new(rules());
    let mut snap = snapshot();

    reconciler.plan(batch(), &mut snap, 1_700_000_000);
    let second = reconciler.plan(batch(), &mut snap, 1_700_000_500);

    let mut report = RunReport::new(true);
    for item in &second.items {
        let outcome = match &item.plan {
            Ok(plan) => RecordOutcome::Planned {
                action: match &plan.write {
                    WritePlan::Create { .. } => PlanAction::Create,
                    WritePlan::Update { .. } => PlanAction::Update,
                    WritePlan::NoOp { .. } => PlanAction::NoOp,
                },
            },
            Err(reason) => RecordOutcome::skipped(reason),
        };
        report.push(RecordResult {
            company_id: item.company_id,
            user_id: item.user_id,
            identifier: item
                .plan
                .as_ref()
                .ok()
                .map(|p| p.identifier.to_string()),
            outcome,
        });
    }

    assert!(report.is_converged(), "counts: {:?}", report.counts);
    assert_eq!(report.counts.unchanged, 3);
    assert_eq!(report.counts.skipped, 2);

    for (_, plan) in second.accepted() {
        assert!(plan.memberships.iter().all(|op| !op.is_add()));
    }
}

#[test]
fn group_pass_after_sync_has_no_deltas() {
    let reconciler = Reconciler::new(rules());
    let mut snap = snapshot();
    reconciler.plan(batch(), &mut snap, 1_700_000_000);

    let desired = reconciler.desired_group_membership(&snap);
    assert!(desired["users"].contains("tanaka-tarou"));
    assert!(desired["esmile-dev"].contains("tanaka-tarou"));
    assert!(desired["adm-cls"].contains("suzuki-ichirou"));

    // Person sync already added everyone to their groups.
    let deltas = diff_membership(&snap, &desired, true);
    assert!(deltas.is_empty(), "unexpected deltas: {deltas:?}");
}

#[test]
fn prune_removes_members_sync_never_would() {
    let reconciler = Reconciler::new(rules());
    let mut snap = snapshot();
    snap.insert_entry(DirectoryEntry {
        dn: "uid=tanaka-tarou,ou=Users,dc=example,dc=org".into(),
        uid: "tanaka-tarou".into(),
        uid_number: 70023,
        gid_number: 2001,
        employee_type: Some("stf-cls 15".into()),
        ..DirectoryEntry::default()
    });
    // Stale membership: tanaka moved out of adm-cls long ago.
    snap.insert_group(GroupEntry {
        dn: "cn=adm-cls,ou=Groups,dc=example,dc=org".into(),
        name: "adm-cls".into(),
        gid_number: 3001,
        member_uids: BTreeSet::from(["tanaka-tarou".to_string()]),
    });

    let desired = reconciler.desired_group_membership(&snap);

    let without_prune = diff_membership(&snap, &desired, false);
    assert!(without_prune
        .iter()
        .all(|d| d.remove.is_empty()));

    let with_prune = diff_membership(&snap, &desired, true);
    let adm = with_prune
        .iter()
        .find(|d| d.group == "adm-cls")
        .expect("adm-cls delta");
    assert_eq!(adm.remove, ["tanaka-tarou"]);
}

#[test]
fn explicit_ids_then_immutability_across_passes() {
    let reconciler = Reconciler::new(rules());
    let mut snap = snapshot();

    let mut r = person(7, 23, "タナカ", "タロウ");
    r.uid_number = Some(55555);
    r.gid_number = Some(100);
    reconciler.plan(vec![r], &mut snap, 0);

    // Source later drops the explicit columns; the entry keeps its ids.
    let second = reconciler.plan(vec![person(7, 23, "タナカ", "タロウ")], &mut snap, 0);
    let plan = second.items[0].plan.as_ref().unwrap();
    assert_eq!(plan.ids.uid_number, 55555);
    assert_eq!(plan.ids.gid_number, 100);
}
