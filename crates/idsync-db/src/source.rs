//! Source-record loading.
//!
//! Reads from the `identity_source` view, which joins the personnel tables
//! into one row per `(company_id, user_id)`. Rows that cannot be represented
//! (negative keys, levels outside u32) are logged and dropped rather than
//! failing the whole load.

use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};

use idsync_core::record::SourceRecord;

use crate::error::{DbError, DbResult};

/// Optional key filter for a partial run.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Restrict to these company ids; empty means all.
    pub companies: Vec<i64>,
    /// Restrict to these user ids; empty means all.
    pub users: Vec<i64>,
}

/// One row of the `identity_source` view.
#[derive(Debug, FromRow)]
struct SourceRow {
    company_id: i64,
    user_id: i64,
    active: bool,
    family_name: Option<String>,
    given_name: Option<String>,
    family_kana: Option<String>,
    given_kana: Option<String>,
    middle_name: Option<String>,
    alias: Option<String>,
    secondary_alias: Option<String>,
    uid_number: Option<i64>,
    gid_number: Option<i64>,
    credential: Option<String>,
    home_directory: Option<String>,
    login_shell: Option<String>,
    employee_type: Option<String>,
    level_id: Option<i64>,
    business_group: Option<String>,
    alternate_mail: Option<Vec<String>>,
}

impl SourceRow {
    fn into_record(self) -> Option<SourceRecord> {
        let company_id = u32::try_from(self.company_id).ok()?;
        let user_id = u32::try_from(self.user_id).ok()?;
        Some(SourceRecord {
            company_id,
            user_id,
            active: self.active,
            family_name: self.family_name.unwrap_or_default(),
            given_name: self.given_name.unwrap_or_default(),
            family_kana: self.family_kana.unwrap_or_default(),
            given_kana: self.given_kana.unwrap_or_default(),
            middle_name: self.middle_name,
            alias: self.alias,
            secondary_alias: self.secondary_alias,
            uid_number: self.uid_number,
            gid_number: self.gid_number,
            credential: self.credential,
            home_directory: self.home_directory,
            login_shell: self.login_shell,
            employee_type: self.employee_type,
            level_id: self.level_id.and_then(|l| u32::try_from(l).ok()),
            business_group: self.business_group,
            alternate_mail: self.alternate_mail.unwrap_or_default(),
        })
    }
}

/// Connect to the authoritative store.
pub async fn connect(database_url: &str) -> DbResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(DbError::ConnectionFailed)
}

/// Reader over the authoritative store.
pub struct SourceStore {
    pool: PgPool,
}

impl SourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch source records, optionally filtered by key, in key order.
    pub async fn fetch_records(&self, filter: &RecordFilter) -> DbResult<Vec<SourceRecord>> {
        let rows: Vec<SourceRow> = sqlx::query_as(
            r"
            SELECT company_id, user_id, active,
                   family_name, given_name, family_kana, given_kana, middle_name,
                   alias, secondary_alias,
                   uid_number, gid_number,
                   credential, home_directory, login_shell,
                   employee_type, level_id, business_group,
                   alternate_mail
            FROM identity_source
            WHERE (cardinality($1::bigint[]) = 0 OR company_id = ANY($1))
              AND (cardinality($2::bigint[]) = 0 OR user_id = ANY($2))
            ORDER BY company_id, user_id
            ",
        )
        .bind(&filter.companies)
        .bind(&filter.users)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::QueryFailed)?;

        let total = rows.len();
        let records: Vec<SourceRecord> = rows
            .into_iter()
            .filter_map(|row| {
                let key = (row.company_id, row.user_id);
                let record = row.into_record();
                if record.is_none() {
                    warn!(
                        company_id = key.0,
                        user_id = key.1,
                        "source row has unrepresentable keys; dropped"
                    );
                }
                record
            })
            .collect();

        info!(
            fetched = total,
            usable = records.len(),
            "source records loaded"
        );
        Ok(records)
    }
}
