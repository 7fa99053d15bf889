//! Groups command: converge memberUid sets from directory state.
//!
//! Desired membership is derived from the person entries themselves: every
//! entry belongs to the default group, its business group by primary
//! gidNumber, and its rank class by employeeType. Removals require `--prune`
//! on top of `--confirm`.

use clap::Args;
use serde::Serialize;
use tracing::info;

use idsync_connector_ldap::Executor;
use idsync_core::{diff_membership, GroupDelta, Reconciler};

use crate::commands::{DirectoryOpts, RulesOpts};
use crate::error::CliResult;

/// Arguments for the groups command.
#[derive(Args)]
pub struct GroupsArgs {
    #[command(flatten)]
    pub directory: DirectoryOpts,

    #[command(flatten)]
    pub rules: RulesOpts,

    /// Actually write; without this the deltas are printed and discarded
    #[arg(long)]
    pub confirm: bool,

    /// Also remove members no longer entitled to a group
    #[arg(long)]
    pub prune: bool,

    /// Output the deltas as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct GroupsOutput<'a> {
    dry_run: bool,
    prune: bool,
    deltas: &'a [GroupDelta],
    adds: u64,
    removes: u64,
}

pub async fn execute(args: GroupsArgs) -> CliResult<()> {
    let dry_run = !args.confirm;
    if dry_run {
        info!("dry run: no directory writes will be performed");
    }

    let mut client = args.directory.client()?;
    let snapshot = client.load_snapshot().await?;

    let rules = args.rules.rules(&args.directory, false);
    let reconciler = Reconciler::new(rules);
    let desired = reconciler.desired_group_membership(&snapshot);
    let deltas = diff_membership(&snapshot, &desired, args.prune);

    let (mut adds, mut removes) = (0u64, 0u64);
    if dry_run {
        for delta in &deltas {
            adds += delta.add.len() as u64;
            removes += delta.remove.len() as u64;
        }
    } else {
        let mut executor = Executor::new(&mut client);
        for delta in &deltas {
            let (a, r) = executor.apply_group_delta(delta).await?;
            adds += a;
            removes += r;
        }
        client.close().await?;
    }

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&GroupsOutput {
                dry_run,
                prune: args.prune,
                deltas: &deltas,
                adds,
                removes,
            })?
        );
        return Ok(());
    }

    let mode = if dry_run { "planned" } else { "applied" };
    for delta in &deltas {
        for uid in &delta.add {
            println!("{mode} add: {uid} -> {}", delta.group);
        }
        for uid in &delta.remove {
            println!("{mode} remove: {uid} <- {}", delta.group);
        }
    }
    println!(
        "{mode}: {} group(s) changed, {adds} add(s), {removes} remove(s)",
        deltas.len()
    );
    Ok(())
}
