//! idsync - reconcile the personnel store into the LDAP directory.
//!
//! Every run is a dry run unless `--confirm` is given: the plan is computed
//! and printed, nothing is written. `sync` reconciles person entries and
//! their group adds; `groups` converges memberUid sets directory-wide.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;

use error::CliResult;

/// Reconcile the authoritative personnel store into the LDAP directory.
#[derive(Parser)]
#[command(name = "idsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile person entries from the source database
    Sync(commands::sync::SyncArgs),

    /// Converge group memberUid sets from directory state
    Groups(commands::groups::GroupsArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Sync(args) => commands::sync::execute(args).await,
        Commands::Groups(args) => commands::groups::execute(args).await,
    }
}
