//! Pure reconciliation core: derive login identifiers from source records,
//! resolve immutable numeric ids, classify ranks and business groups, and
//! plan idempotent directory writes and membership changes.
//!
//! This crate owns no I/O. The database reader and the directory connector
//! feed it [`record::SourceRecord`]s and a [`snapshot::DirectorySnapshot`];
//! it hands back a [`reconciler::RunPlan`] for the executor to apply.

pub mod classify;
pub mod credential;
pub mod error;
pub mod identifier;
pub mod membership;
pub mod numeric;
pub mod plan;
pub mod reconciler;
pub mod record;
pub mod report;
pub mod romaji;
pub mod snapshot;

pub use classify::{BusinessGroups, ClassDef, ClassTable, Classification};
pub use error::{PlanResult, SkipReason};
pub use identifier::{derive_identifier, Identifier};
pub use membership::{diff_membership, GroupDelta, MembershipOp};
pub use numeric::{assign_numeric_ids, IdSource, NumericIds};
pub use plan::{plan_write, AttributeChange, WritePlan};
pub use reconciler::{PlannedRecord, RecordPlan, ReconcileRules, Reconciler, RunPlan};
pub use record::SourceRecord;
pub use report::{PlanAction, RecordOutcome, RecordResult, RunCounts, RunReport};
pub use snapshot::{DirectoryEntry, DirectorySnapshot, GroupEntry};
