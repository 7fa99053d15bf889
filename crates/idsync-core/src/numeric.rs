//! Numeric id assignment.
//!
//! Resolution order:
//! 1. An existing directory entry's ids are immutable and always reused,
//!    even when the source row carries different explicit columns.
//! 2. Explicit positive ids on the source record.
//! 3. The deterministic formula `uid = company_id * 10000 + user_id`,
//!    `gid = 2000 + company_id`. Collision-free across companies as long as
//!    `user_id` stays in `[0, 9999]`; outside that domain the record is
//!    skipped, never silently defaulted.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PlanResult, SkipReason};
use crate::record::SourceRecord;
use crate::snapshot::DirectoryEntry;

/// Hard constraint of the formula: `user_id` domain is `[0, 9999]`.
pub const USER_ID_FORMULA_MAX: u32 = 9_999;

const UID_COMPANY_FACTOR: i64 = 10_000;
const GID_BASE: i64 = 2_000;

/// Where a resolved id pair came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdSource {
    /// Reused from the existing directory entry.
    Directory,
    /// Taken from explicit columns on the source record.
    Explicit,
    /// Computed by the deterministic formula (for one or both values).
    Formula,
}

/// Resolved numeric ids for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericIds {
    pub uid_number: i64,
    pub gid_number: i64,
    pub source: IdSource,
}

/// uidNumber for the formula path.
pub fn formula_uid_number(company_id: u32, user_id: u32) -> i64 {
    i64::from(company_id) * UID_COMPANY_FACTOR + i64::from(user_id)
}

/// gidNumber for the formula path.
pub fn formula_gid_number(company_id: u32) -> i64 {
    GID_BASE + i64::from(company_id)
}

/// Resolve the numeric ids for a record.
pub fn assign_numeric_ids(
    record: &SourceRecord,
    existing: Option<&DirectoryEntry>,
) -> PlanResult<NumericIds> {
    if let Some(entry) = existing {
        let reused = NumericIds {
            uid_number: entry.uid_number,
            gid_number: entry.gid_number,
            source: IdSource::Directory,
        };
        if let Some(explicit) = record.uid_number.filter(|&n| n > 0) {
            if explicit != entry.uid_number {
                warn!(
                    company_id = record.company_id,
                    user_id = record.user_id,
                    uid = %entry.uid,
                    existing = entry.uid_number,
                    explicit,
                    "explicit uidNumber disagrees with existing entry; reusing existing"
                );
            }
        }
        if let Some(explicit) = record.gid_number.filter(|&n| n > 0) {
            if explicit != entry.gid_number {
                warn!(
                    company_id = record.company_id,
                    user_id = record.user_id,
                    uid = %entry.uid,
                    existing = entry.gid_number,
                    explicit,
                    "explicit gidNumber disagrees with existing entry; reusing existing"
                );
            }
        }
        return Ok(reused);
    }

    let explicit_uid = record.uid_number.filter(|&n| n > 0);
    let explicit_gid = record.gid_number.filter(|&n| n > 0);

    let uid_number = match explicit_uid {
        Some(n) => n,
        None => {
            if record.user_id > USER_ID_FORMULA_MAX {
                return Err(SkipReason::UserIdOutOfRange {
                    user_id: record.user_id,
                });
            }
            formula_uid_number(record.company_id, record.user_id)
        }
    };
    let gid_number = explicit_gid.unwrap_or_else(|| formula_gid_number(record.company_id));

    if uid_number <= 0 || gid_number <= 0 {
        return Err(SkipReason::MissingNumericIds);
    }

    let source = if explicit_uid.is_some() && explicit_gid.is_some() {
        IdSource::Explicit
    } else {
        IdSource::Formula
    };

    Ok(NumericIds {
        uid_number,
        gid_number,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing(uid: &str, uid_number: i64, gid_number: i64) -> DirectoryEntry {
        DirectoryEntry {
            uid: uid.into(),
            uid_number,
            gid_number,
            ..DirectoryEntry::default()
        }
    }

    #[test]
    fn formula_matches_the_worked_example() {
        assert_eq!(formula_uid_number(7, 23), 70023);
        assert_eq!(formula_gid_number(7), 2007);
    }

    #[test]
    fn formula_is_collision_free_over_the_domain() {
        // Spot-check the boundaries rather than the full cross product.
        let pairs = [(1u32, 0u32), (1, 9999), (2, 0), (99, 9999), (42, 5000)];
        let mut seen = std::collections::HashSet::new();
        for (c, u) in pairs {
            assert!(seen.insert(formula_uid_number(c, u)));
        }
        // Adjacent companies cannot collide while user_id <= 9999.
        assert!(formula_uid_number(1, 9999) < formula_uid_number(2, 0));
    }

    #[test]
    fn existing_entry_ids_are_reused_over_explicit_columns() {
        let mut r = SourceRecord::new(7, 23);
        r.uid_number = Some(88888);
        r.gid_number = Some(999);
        let e = existing("tanaka-tarou", 70023, 2007);

        let ids = assign_numeric_ids(&r, Some(&e)).unwrap();
        assert_eq!(ids.uid_number, 70023);
        assert_eq!(ids.gid_number, 2007);
        assert_eq!(ids.source, IdSource::Directory);
    }

    #[test]
    fn existing_entry_ids_are_reused_over_missing_columns() {
        let r = SourceRecord::new(7, 23);
        let e = existing("tanaka-tarou", 123456, 100);
        let ids = assign_numeric_ids(&r, Some(&e)).unwrap();
        assert_eq!(ids.uid_number, 123456);
        assert_eq!(ids.gid_number, 100);
    }

    #[test]
    fn explicit_ids_win_for_new_entries() {
        let mut r = SourceRecord::new(7, 23);
        r.uid_number = Some(50001);
        r.gid_number = Some(100);
        let ids = assign_numeric_ids(&r, None).unwrap();
        assert_eq!(ids.uid_number, 50001);
        assert_eq!(ids.gid_number, 100);
        assert_eq!(ids.source, IdSource::Explicit);
    }

    #[test]
    fn partial_explicit_fills_from_formula() {
        let mut r = SourceRecord::new(7, 23);
        r.gid_number = Some(100);
        let ids = assign_numeric_ids(&r, None).unwrap();
        assert_eq!(ids.uid_number, 70023);
        assert_eq!(ids.gid_number, 100);
        assert_eq!(ids.source, IdSource::Formula);
    }

    #[test]
    fn non_positive_explicit_ids_are_ignored() {
        let mut r = SourceRecord::new(7, 23);
        r.uid_number = Some(0);
        r.gid_number = Some(-5);
        let ids = assign_numeric_ids(&r, None).unwrap();
        assert_eq!(ids.uid_number, 70023);
        assert_eq!(ids.gid_number, 2007);
    }

    #[test]
    fn user_id_outside_formula_domain_is_a_distinct_skip() {
        let r = SourceRecord::new(7, 10000);
        assert_eq!(
            assign_numeric_ids(&r, None),
            Err(SkipReason::UserIdOutOfRange { user_id: 10000 })
        );
    }
}
