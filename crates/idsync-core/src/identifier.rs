//! Login identifier derivation.
//!
//! Derivation order: explicit alias, then transliteration of the phonetic
//! name fields, then the secondary alias. The result is constrained to
//! `[a-z0-9-]`, at least two characters, with no leading or trailing
//! hyphens. Derivation is pure; the same record always yields the same
//! identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PlanResult, SkipReason};
use crate::record::SourceRecord;
use crate::romaji;

/// Minimum accepted identifier length after normalization.
const MIN_LENGTH: usize = 2;

/// A validated login identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Validate an already-normalized candidate.
    pub fn new(candidate: impl Into<String>) -> PlanResult<Self> {
        let candidate = candidate.into();
        let valid = candidate.len() >= MIN_LENGTH
            && !candidate.starts_with('-')
            && !candidate.ends_with('-')
            && candidate
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && candidate.chars().any(|c| c != '-');
        if valid {
            Ok(Self(candidate))
        } else {
            Err(SkipReason::NoUsableIdentifier)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the login identifier for a source record.
pub fn derive_identifier(record: &SourceRecord) -> PlanResult<Identifier> {
    if let Some(alias) = record.alias.as_deref() {
        if let Ok(id) = Identifier::new(normalize(alias)) {
            return Ok(id);
        }
    }

    if record.has_phonetic_name() {
        let family = sanitize_part(&romaji::transliterate(record.family_kana.trim()));
        let given = sanitize_part(&romaji::transliterate(record.given_kana.trim()));
        let middle = record
            .middle_name
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(|m| sanitize_part(&romaji::transliterate(m)))
            .unwrap_or_default();

        if !family.is_empty() && !given.is_empty() {
            // Middle name is appended directly, without a separator.
            let candidate = format!("{family}-{given}{middle}");
            if let Ok(id) = Identifier::new(normalize(&candidate)) {
                return Ok(id);
            }
        }
    }

    if let Some(secondary) = record.secondary_alias.as_deref() {
        if let Ok(id) = Identifier::new(normalize(secondary)) {
            return Ok(id);
        }
    }

    Err(SkipReason::NoUsableIdentifier)
}

/// Lowercase, drop everything outside `[a-z0-9-]`, trim hyphen runs at the
/// ends.
fn normalize(raw: &str) -> String {
    let lowered: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();
    lowered.trim_matches('-').to_string()
}

/// Identifier fragment: alphanumerics only, hyphens join fragments later.
fn sanitize_part(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_kana(family: &str, given: &str) -> SourceRecord {
        let mut r = SourceRecord::new(7, 23);
        r.family_kana = family.into();
        r.given_kana = given.into();
        r
    }

    #[test]
    fn transliterates_family_and_given() {
        let r = record_with_kana("タナカ", "タロウ");
        assert_eq!(derive_identifier(&r).unwrap().as_str(), "tanaka-tarou");
    }

    #[test]
    fn middle_name_appends_without_separator() {
        let mut r = record_with_kana("タナカ", "タロウ");
        r.middle_name = Some("ジョン".into());
        assert_eq!(derive_identifier(&r).unwrap().as_str(), "tanaka-taroujon");
    }

    #[test]
    fn alias_wins_over_transliteration() {
        let mut r = record_with_kana("タナカ", "タロウ");
        r.alias = Some("T.Tanaka-2".into());
        assert_eq!(derive_identifier(&r).unwrap().as_str(), "ttanaka-2");
    }

    #[test]
    fn unusable_alias_falls_back_to_kana() {
        let mut r = record_with_kana("タナカ", "タロウ");
        r.alias = Some("--".into());
        assert_eq!(derive_identifier(&r).unwrap().as_str(), "tanaka-tarou");
    }

    #[test]
    fn secondary_alias_is_the_last_resort() {
        let mut r = SourceRecord::new(1, 1);
        r.secondary_alias = Some("Legacy_Login".into());
        assert_eq!(derive_identifier(&r).unwrap().as_str(), "legacylogin");
    }

    #[test]
    fn missing_everything_is_a_structural_skip() {
        let r = SourceRecord::new(1, 1);
        assert_eq!(derive_identifier(&r), Err(SkipReason::NoUsableIdentifier));
    }

    #[test]
    fn derivation_is_idempotent() {
        let r = record_with_kana("シオズミ", "マコト");
        let a = derive_identifier(&r).unwrap();
        let b = derive_identifier(&r).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "shiozumi-makoto");
    }

    #[test]
    fn identifier_rejects_short_or_hyphen_only() {
        assert!(Identifier::new("a").is_err());
        assert!(Identifier::new("--").is_err());
        assert!(Identifier::new("-ab").is_err());
        assert!(Identifier::new("ab").is_ok());
    }
}
