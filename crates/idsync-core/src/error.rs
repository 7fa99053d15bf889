//! Error taxonomy for the reconciliation core.
//!
//! `SkipReason` covers structural problems in source data: the record is
//! skipped and the run continues, and only fixing the source data resolves
//! it. Operational write failures live on the directory client's error type;
//! the core only carries their terminal classification in the run report.

use thiserror::Error;

/// Structural reason a source record was skipped during planning.
///
/// Skips are terminal for the record, counted in the run report, and never
/// contribute to the process error exit status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    /// The record's validity flag is off.
    #[error("record is inactive")]
    Inactive,

    /// No alias and no usable phonetic name fields.
    #[error("no usable identifier could be derived")]
    NoUsableIdentifier,

    /// Numeric ids could not be resolved from the record, the formula, or
    /// the existing directory state.
    #[error("numeric ids unresolved")]
    MissingNumericIds,

    /// The deterministic formula only covers user ids up to 9999.
    #[error("user id {user_id} is outside the formula domain [0,9999]")]
    UserIdOutOfRange { user_id: u32 },

    /// Another record in the same run already claimed this uidNumber.
    #[error("uidNumber {uid_number} already claimed by '{claimed_by}'")]
    NumericIdCollision { uid_number: i64, claimed_by: String },

    /// Applying the plan would change an existing entry's numeric ids,
    /// which are immutable once assigned. Surfaced distinctly from ordinary
    /// write failures.
    #[error("refusing to change immutable numeric ids of '{uid}' ({existing} -> {desired})")]
    ImmutableIdViolation {
        uid: String,
        existing: i64,
        desired: i64,
    },
}

impl SkipReason {
    /// Stable code for logs and the serialized run report.
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::Inactive => "INACTIVE",
            SkipReason::NoUsableIdentifier => "NO_USABLE_IDENTIFIER",
            SkipReason::MissingNumericIds => "MISSING_NUMERIC_IDS",
            SkipReason::UserIdOutOfRange { .. } => "USER_ID_OUT_OF_RANGE",
            SkipReason::NumericIdCollision { .. } => "NUMERIC_ID_COLLISION",
            SkipReason::ImmutableIdViolation { .. } => "IMMUTABLE_ID_VIOLATION",
        }
    }

    /// Whether this skip protects an immutability invariant rather than
    /// flagging incomplete source data.
    pub fn is_invariant_guard(&self) -> bool {
        matches!(
            self,
            SkipReason::NumericIdCollision { .. } | SkipReason::ImmutableIdViolation { .. }
        )
    }
}

/// Result type for core planning operations.
pub type PlanResult<T> = Result<T, SkipReason>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(SkipReason::NoUsableIdentifier.code(), "NO_USABLE_IDENTIFIER");
        assert_eq!(SkipReason::MissingNumericIds.code(), "MISSING_NUMERIC_IDS");
        assert_eq!(
            SkipReason::UserIdOutOfRange { user_id: 12000 }.code(),
            "USER_ID_OUT_OF_RANGE"
        );
    }

    #[test]
    fn invariant_guards_are_flagged() {
        assert!(SkipReason::NumericIdCollision {
            uid_number: 70023,
            claimed_by: "tanaka-tarou".into()
        }
        .is_invariant_guard());
        assert!(SkipReason::ImmutableIdViolation {
            uid: "tanaka-tarou".into(),
            existing: 70023,
            desired: 70024
        }
        .is_invariant_guard());
        assert!(!SkipReason::NoUsableIdentifier.is_invariant_guard());
    }
}
