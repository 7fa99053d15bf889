//! Sync command: reconcile person entries from the source database.

use chrono::Utc;
use clap::Args;
use tracing::{info, warn};

use idsync_connector_ldap::Executor;
use idsync_core::{
    PlanAction, Reconciler, RecordOutcome, RecordResult, RunReport, WritePlan,
};
use idsync_db::{RecordFilter, SourceStore};

use crate::commands::{DirectoryOpts, RulesOpts};
use crate::error::{CliError, CliResult};

/// Arguments for the sync command.
#[derive(Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub directory: DirectoryOpts,

    #[command(flatten)]
    pub rules: RulesOpts,

    /// Source database connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Restrict the run to these company ids (repeatable)
    #[arg(long = "company")]
    pub companies: Vec<i64>,

    /// Restrict the run to these user ids (repeatable)
    #[arg(long = "user")]
    pub users: Vec<i64>,

    /// Actually write; without this the plan is printed and discarded
    #[arg(long)]
    pub confirm: bool,

    /// Rewrite credential attributes on existing entries
    #[arg(long)]
    pub rotate_credentials: bool,

    /// Output the full report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: SyncArgs) -> CliResult<()> {
    let dry_run = !args.confirm;
    if dry_run {
        info!("dry run: no directory writes will be performed");
    }

    let pool = idsync_db::connect(&args.database_url).await?;
    let store = SourceStore::new(pool);
    let filter = RecordFilter {
        companies: args.companies.clone(),
        users: args.users.clone(),
    };
    let records = store.fetch_records(&filter).await?;

    let mut client = args.directory.client()?;
    let mut snapshot = client.load_snapshot().await?;

    let rules = args.rules.rules(&args.directory, args.rotate_credentials);
    let reconciler = Reconciler::new(rules);
    let run = reconciler.plan(records, &mut snapshot, Utc::now().timestamp());

    let mut report = RunReport::new(dry_run);
    if dry_run {
        for item in &run.items {
            let (identifier, outcome) = match &item.plan {
                Ok(plan) => {
                    let action = match &plan.write {
                        WritePlan::Create { .. } => PlanAction::Create,
                        WritePlan::Update { .. } => PlanAction::Update,
                        WritePlan::NoOp { .. } => PlanAction::NoOp,
                    };
                    report.counts.membership_adds +=
                        plan.memberships.iter().filter(|op| op.is_add()).count() as u64;
                    report.counts.unresolved_groups +=
                        plan.memberships.iter().filter(|op| op.is_unresolved()).count() as u64;
                    (
                        Some(plan.identifier.to_string()),
                        RecordOutcome::Planned { action },
                    )
                }
                Err(reason) => (None, RecordOutcome::skipped(reason)),
            };
            report.push(RecordResult {
                company_id: item.company_id,
                user_id: item.user_id,
                identifier,
                outcome,
            });
        }
    } else {
        let mut executor = Executor::new(&mut client);
        for item in &run.items {
            let (identifier, outcome) = match &item.plan {
                Ok(plan) => {
                    let identifier = Some(plan.identifier.to_string());
                    match executor.apply_record(plan).await {
                        Ok(applied) => {
                            report.counts.membership_adds += applied.membership_adds;
                            report.counts.unresolved_groups += applied.unresolved_groups;
                            (
                                identifier,
                                RecordOutcome::Applied {
                                    action: applied.action,
                                },
                            )
                        }
                        Err(e) => {
                            warn!(
                                company_id = item.company_id,
                                user_id = item.user_id,
                                code = e.error_code(),
                                "record write failed: {e}"
                            );
                            (
                                identifier,
                                RecordOutcome::Failed {
                                    detail: e.to_string(),
                                    transient: e.is_transient(),
                                },
                            )
                        }
                    }
                }
                Err(reason) => (None, RecordOutcome::skipped(reason)),
            };
            report.push(RecordResult {
                company_id: item.company_id,
                user_id: item.user_id,
                identifier,
                outcome,
            });
        }
        client.close().await?;
    }

    print_report(&report, args.json)?;

    if report.has_failures() {
        return Err(CliError::RecordsFailed {
            failed: report.counts.failed,
        });
    }
    Ok(())
}

fn print_report(report: &RunReport, json: bool) -> CliResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let mode = if report.dry_run { "planned" } else { "applied" };
    for record in &report.records {
        let key = format!("{}/{}", record.company_id, record.user_id);
        let uid = record.identifier.as_deref().unwrap_or("-");
        match &record.outcome {
            RecordOutcome::Planned { action } | RecordOutcome::Applied { action } => {
                if !matches!(action, PlanAction::NoOp) {
                    println!("{mode} {action:?}: {key} -> {uid}");
                }
            }
            RecordOutcome::Skipped { code, detail } => {
                println!("skipped [{code}]: {key} ({detail})");
            }
            RecordOutcome::Failed { detail, .. } => {
                println!("FAILED: {key} -> {uid} ({detail})");
            }
        }
    }
    let c = &report.counts;
    println!(
        "{mode}: {} scanned, {} created, {} updated, {} unchanged, {} skipped, {} failed, {} membership adds",
        c.scanned, c.created, c.updated, c.unchanged, c.skipped, c.failed, c.membership_adds
    );
    Ok(())
}
