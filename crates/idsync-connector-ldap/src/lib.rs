//! LDAP connector for the reconciliation pipeline.
//!
//! [`DirectoryClient`] owns the connection and turns directory state into
//! the core's snapshot types; [`Executor`] applies a planned run back to
//! the directory.

pub mod config;
pub mod connector;
pub mod error;
pub mod executor;

pub use config::DirectoryConfig;
pub use connector::DirectoryClient;
pub use error::{DirectoryError, DirectoryResult};
pub use executor::Executor;
