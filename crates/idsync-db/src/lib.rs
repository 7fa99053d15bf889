//! Reader for the authoritative personnel store.
//!
//! One query per run: the `identity_source` view is fetched in
//! `(company_id, user_id)` order and handed to the reconciliation core.

pub mod error;
pub mod source;

pub use error::{DbError, DbResult};
pub use source::{connect, RecordFilter, SourceStore};
