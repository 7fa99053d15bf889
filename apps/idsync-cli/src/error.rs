//! CLI error types and exit codes.
//!
//! - 0: success (including a clean dry run)
//! - 1: the run completed but some records failed
//! - 2: fatal error before or during the run (configuration, connectivity)

use thiserror::Error;

use idsync_connector_ldap::DirectoryError;
use idsync_db::DbError;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Source database error: {0}")]
    Db(#[from] DbError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("{failed} record(s) failed; see the log for details")]
    RecordsFailed { failed: u64 },

    #[error("Report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::RecordsFailed { .. } => 1,
            CliError::Serialization(_) => 1,
            CliError::Db(_) | CliError::Directory(_) => 2,
        }
    }

    pub fn print(&self) {
        eprintln!("Error: {self}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failures_exit_1_fatal_errors_exit_2() {
        assert_eq!(CliError::RecordsFailed { failed: 3 }.exit_code(), 1);
        assert_eq!(
            CliError::Directory(DirectoryError::AuthenticationFailed).exit_code(),
            2
        );
    }
}
