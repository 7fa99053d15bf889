//! Source-of-truth record as read from the authoritative database.

use serde::{Deserialize, Serialize};

/// One row from the authoritative store.
///
/// `(company_id, user_id)` is the stable unique key across runs. Everything
/// else is descriptive payload; optional columns are `None` when the source
/// leaves them empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceRecord {
    pub company_id: u32,
    pub user_id: u32,
    /// Validity flag; inactive records are skipped, never deleted.
    pub active: bool,

    pub family_name: String,
    pub given_name: String,
    /// Phonetic (kana) family name, the primary identifier source.
    pub family_kana: String,
    /// Phonetic (kana) given name.
    pub given_kana: String,
    /// Optional middle name, appended to the identifier without a separator.
    pub middle_name: Option<String>,

    /// Explicit login alias; wins over transliteration when usable.
    pub alias: Option<String>,
    /// Secondary alias, tried once when transliteration yields nothing.
    pub secondary_alias: Option<String>,

    /// Pre-assigned numeric user id, authoritative for new entries.
    pub uid_number: Option<i64>,
    /// Pre-assigned numeric group id.
    pub gid_number: Option<i64>,

    /// Plaintext or `{SCHEME}`-prefixed pre-hashed credential.
    pub credential: Option<String>,

    pub home_directory: Option<String>,
    pub login_shell: Option<String>,

    /// Free-form rank string, e.g. `"adm-cls 1"`.
    pub employee_type: Option<String>,
    /// Standalone numeric rank level.
    pub level_id: Option<u32>,
    /// Business group name, e.g. `"esmile-dev"`.
    pub business_group: Option<String>,

    /// Alternate mail addresses carried verbatim from the source.
    pub alternate_mail: Vec<String>,
}

impl SourceRecord {
    /// Create a minimal active record; the rest defaults to empty.
    pub fn new(company_id: u32, user_id: u32) -> Self {
        Self {
            company_id,
            user_id,
            active: true,
            ..Self::default()
        }
    }

    /// The stable unique key of this record.
    pub fn key(&self) -> (u32, u32) {
        (self.company_id, self.user_id)
    }

    /// Whether both required phonetic name fields are present.
    pub fn has_phonetic_name(&self) -> bool {
        !self.family_kana.trim().is_empty() && !self.given_kana.trim().is_empty()
    }
}
