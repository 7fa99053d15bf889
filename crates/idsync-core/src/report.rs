//! Run reporting.
//!
//! Every record ends in exactly one outcome; the report carries them all
//! plus aggregate counts, and serializes for the CLI's summary output.
//! Skips are expected operational noise; only failures make the run
//! unsuccessful.

use serde::{Deserialize, Serialize};

use crate::error::SkipReason;

/// What kind of directory write a record planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    Create,
    Update,
    NoOp,
}

/// Terminal outcome for one source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Dry run: the write was planned but not sent.
    Planned { action: PlanAction },
    /// The write was sent and acknowledged.
    Applied { action: PlanAction },
    /// Structural skip; the record was not written.
    Skipped { code: String, detail: String },
    /// The write was attempted and failed.
    Failed { detail: String, transient: bool },
}

impl RecordOutcome {
    pub fn skipped(reason: &SkipReason) -> Self {
        RecordOutcome::Skipped {
            code: reason.code().to_string(),
            detail: reason.to_string(),
        }
    }
}

/// One record's line in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordResult {
    pub company_id: u32,
    pub user_id: u32,
    /// Absent when derivation itself was the skip.
    pub identifier: Option<String>,
    #[serde(flatten)]
    pub outcome: RecordOutcome,
}

/// Aggregate counts over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub scanned: u64,
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub skipped: u64,
    pub failed: u64,
    pub membership_adds: u64,
    pub membership_removes: u64,
    pub unresolved_groups: u64,
}

/// Full report for one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub records: Vec<RecordResult>,
    pub counts: RunCounts,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn push(&mut self, result: RecordResult) {
        self.counts.scanned += 1;
        match &result.outcome {
            RecordOutcome::Planned { action } | RecordOutcome::Applied { action } => {
                match action {
                    PlanAction::Create => self.counts.created += 1,
                    PlanAction::Update => self.counts.updated += 1,
                    PlanAction::NoOp => self.counts.unchanged += 1,
                }
            }
            RecordOutcome::Skipped { .. } => self.counts.skipped += 1,
            RecordOutcome::Failed { .. } => self.counts.failed += 1,
        }
        self.records.push(result);
    }

    pub fn has_failures(&self) -> bool {
        self.counts.failed > 0
    }

    /// Whether the run converged: every record either unchanged or skipped.
    pub fn is_converged(&self) -> bool {
        self.counts.created == 0 && self.counts.updated == 0 && self.counts.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(outcome: RecordOutcome) -> RecordResult {
        RecordResult {
            company_id: 7,
            user_id: 23,
            identifier: Some("tanaka-tarou".into()),
            outcome,
        }
    }

    #[test]
    fn counts_track_outcomes() {
        let mut report = RunReport::new(false);
        report.push(result(RecordOutcome::Applied {
            action: PlanAction::Create,
        }));
        report.push(result(RecordOutcome::Applied {
            action: PlanAction::NoOp,
        }));
        report.push(result(RecordOutcome::skipped(&SkipReason::Inactive)));
        report.push(result(RecordOutcome::Failed {
            detail: "connection reset".into(),
            transient: true,
        }));

        assert_eq!(report.counts.scanned, 4);
        assert_eq!(report.counts.created, 1);
        assert_eq!(report.counts.unchanged, 1);
        assert_eq!(report.counts.skipped, 1);
        assert_eq!(report.counts.failed, 1);
        assert!(report.has_failures());
        assert!(!report.is_converged());
    }

    #[test]
    fn skips_do_not_fail_the_run() {
        let mut report = RunReport::new(true);
        report.push(result(RecordOutcome::skipped(
            &SkipReason::NoUsableIdentifier,
        )));
        assert!(!report.has_failures());
        assert!(report.is_converged());
    }

    #[test]
    fn skip_outcome_carries_the_stable_code() {
        let outcome = RecordOutcome::skipped(&SkipReason::UserIdOutOfRange { user_id: 12000 });
        let RecordOutcome::Skipped { code, detail } = outcome else {
            panic!("expected skip");
        };
        assert_eq!(code, "USER_ID_OUT_OF_RANGE");
        assert!(detail.contains("12000"));
    }
}
