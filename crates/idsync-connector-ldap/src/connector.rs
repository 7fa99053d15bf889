//! Directory client: connection handling and snapshot loading.

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tracing::{debug, info, warn};

use idsync_core::snapshot::{DirectoryEntry, DirectorySnapshot, GroupEntry};

use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, DirectoryResult};

const PERSON_ATTRS: &[&str] = &[
    "uid",
    "uidNumber",
    "gidNumber",
    "cn",
    "sn",
    "givenName",
    "displayName",
    "employeeType",
    "homeDirectory",
    "loginShell",
    "userPassword",
    "mail",
    "mailAlternateAddress",
    "sambaSID",
    "sambaPrimaryGroupSID",
    "sambaNTPassword",
    "sambaAcctFlags",
    "sambaPwdLastSet",
];

const GROUP_ATTRS: &[&str] = &["cn", "gidNumber", "memberUid"];

/// Client for one directory server.
pub struct DirectoryClient {
    config: DirectoryConfig,
    connection: Option<Ldap>,
}

impl DirectoryClient {
    pub fn new(config: DirectoryConfig) -> DirectoryResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connection: None,
        })
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Get the bound connection, establishing it on first use.
    pub(crate) async fn connection(&mut self) -> DirectoryResult<&mut Ldap> {
        if self.connection.is_none() {
            let ldap = self.connect().await?;
            self.connection = Some(ldap);
        }
        // The option was just filled; this cannot fail.
        self.connection
            .as_mut()
            .ok_or_else(|| DirectoryError::connection_failed("connection slot empty after connect"))
    }

    async fn connect(&self) -> DirectoryResult<Ldap> {
        let url = self.config.url();
        debug!(url = %url, "connecting to directory");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(std::time::Duration::from_secs(
                self.config.connection_timeout_secs,
            ))
            .set_starttls(self.config.use_starttls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                DirectoryError::connection_failed_with_source(
                    format!("failed to connect to directory at {url}"),
                    e,
                )
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "directory connection driver error");
            }
        });

        let bind_dn = &self.config.bind_dn;
        let bind_password = self.config.bind_password.as_deref().unwrap_or("");
        debug!(bind_dn = %bind_dn, "binding to directory");

        let result = ldap.simple_bind(bind_dn, bind_password).await.map_err(|e| {
            DirectoryError::connection_failed_with_source(format!("bind failed for {bind_dn}"), e)
        })?;

        if result.rc != 0 {
            if result.rc == 49 {
                return Err(DirectoryError::AuthenticationFailed);
            }
            return Err(DirectoryError::connection_failed(format!(
                "bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        info!(host = %self.config.host, "directory connection established");
        Ok(ldap)
    }

    /// Load the full directory snapshot: people, groups, and the samba
    /// domain SID when one is published.
    pub async fn load_snapshot(&mut self) -> DirectoryResult<DirectorySnapshot> {
        let mut snapshot = DirectorySnapshot::new();

        let people_base = self.config.people_base();
        for entry in self
            .search_all(&people_base, "(objectClass=posixAccount)", PERSON_ATTRS)
            .await?
        {
            match parse_person(entry) {
                Some(person) => snapshot.insert_entry(person),
                None => warn!("person entry missing uid or numeric ids; ignored"),
            }
        }

        let groups_base = self.config.groups_base();
        for entry in self
            .search_all(&groups_base, "(objectClass=posixGroup)", GROUP_ATTRS)
            .await?
        {
            match parse_group(entry) {
                Some(group) => snapshot.insert_group(group),
                None => warn!("group entry missing cn or gidNumber; ignored"),
            }
        }

        snapshot.domain_sid = self.load_domain_sid().await?;

        info!(
            people = snapshot.entry_count(),
            groups = snapshot.groups().count(),
            samba = snapshot.domain_sid.is_some(),
            "directory snapshot loaded"
        );
        Ok(snapshot)
    }

    async fn load_domain_sid(&mut self) -> DirectoryResult<Option<String>> {
        let base_dn = self.config.base_dn.clone();
        let entries = self
            .search_all(&base_dn, "(objectClass=sambaDomain)", &["sambaSID"])
            .await?;
        Ok(entries
            .into_iter()
            .next()
            .and_then(|e| first_attr(&e, "sambaSID")))
    }

    async fn search_all(
        &mut self,
        base: &str,
        filter: &str,
        attrs: &[&str],
    ) -> DirectoryResult<Vec<SearchEntry>> {
        let ldap = self.connection().await?;
        let result = ldap
            .search(base, Scope::Subtree, filter, attrs.to_vec())
            .await?;
        match result.success() {
            Ok((entries, _res)) => Ok(entries.into_iter().map(SearchEntry::construct).collect()),
            // An absent container reads as an empty result, not a failure.
            Err(ldap3::LdapError::LdapResult { result }) if result.rc == 32 => Ok(Vec::new()),
            Err(e) => Err(DirectoryError::SearchFailed {
                base: base.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Unbind and drop the connection.
    pub async fn close(&mut self) -> DirectoryResult<()> {
        if let Some(mut ldap) = self.connection.take() {
            ldap.unbind().await?;
        }
        Ok(())
    }
}

/// Escape a DN attribute value per RFC 4514.
pub fn escape_dn_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len() * 2);
    let last = value.chars().count().saturating_sub(1);
    for (i, ch) in value.chars().enumerate() {
        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(ch);
            }
            '\0' => result.push_str("\\00"),
            ' ' if i == 0 || i == last => result.push_str("\\20"),
            '#' if i == 0 => result.push_str("\\23"),
            _ => result.push(ch),
        }
    }
    result
}

fn first_attr(entry: &SearchEntry, attr: &str) -> Option<String> {
    entry.attrs.get(attr).and_then(|v| v.first()).cloned()
}

fn multi_attr(entry: &SearchEntry, attr: &str) -> Vec<String> {
    entry.attrs.get(attr).cloned().unwrap_or_default()
}

fn first_i64(entry: &SearchEntry, attr: &str) -> Option<i64> {
    first_attr(entry, attr).and_then(|v| v.parse().ok())
}

fn parse_person(entry: SearchEntry) -> Option<DirectoryEntry> {
    let uid = first_attr(&entry, "uid")?;
    let uid_number = first_i64(&entry, "uidNumber")?;
    let gid_number = first_i64(&entry, "gidNumber")?;
    Some(DirectoryEntry {
        dn: entry.dn.clone(),
        uid,
        uid_number,
        gid_number,
        cn: first_attr(&entry, "cn"),
        sn: first_attr(&entry, "sn"),
        given_name: first_attr(&entry, "givenName"),
        display_name: first_attr(&entry, "displayName"),
        employee_type: first_attr(&entry, "employeeType"),
        home_directory: first_attr(&entry, "homeDirectory"),
        login_shell: first_attr(&entry, "loginShell"),
        user_password: first_attr(&entry, "userPassword"),
        mail: multi_attr(&entry, "mail"),
        mail_alternate: multi_attr(&entry, "mailAlternateAddress"),
        samba_sid: first_attr(&entry, "sambaSID"),
        samba_primary_group_sid: first_attr(&entry, "sambaPrimaryGroupSID"),
        samba_nt_password: first_attr(&entry, "sambaNTPassword"),
        samba_acct_flags: first_attr(&entry, "sambaAcctFlags"),
        samba_pwd_last_set: first_i64(&entry, "sambaPwdLastSet"),
    })
}

fn parse_group(entry: SearchEntry) -> Option<GroupEntry> {
    let name = first_attr(&entry, "cn")?;
    let gid_number = first_i64(&entry, "gidNumber")?;
    Some(GroupEntry {
        dn: entry.dn.clone(),
        name,
        gid_number,
        member_uids: multi_attr(&entry, "memberUid").into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn search_entry(dn: &str, attrs: Vec<(&str, Vec<&str>)>) -> SearchEntry {
        SearchEntry {
            dn: dn.to_string(),
            attrs: attrs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
                .collect(),
            bin_attrs: HashMap::new(),
        }
    }

    #[test]
    fn person_parsing_requires_uid_and_numeric_ids() {
        let entry = search_entry(
            "uid=tanaka-tarou,ou=Users,dc=example,dc=org",
            vec![
                ("uid", vec!["tanaka-tarou"]),
                ("uidNumber", vec!["70023"]),
                ("gidNumber", vec!["2007"]),
                ("employeeType", vec!["stf-cls 15"]),
                ("mail", vec!["tanaka-tarou@example.org"]),
            ],
        );
        let person = parse_person(entry).unwrap();
        assert_eq!(person.uid, "tanaka-tarou");
        assert_eq!(person.uid_number, 70023);
        assert_eq!(person.employee_type.as_deref(), Some("stf-cls 15"));

        let broken = search_entry(
            "uid=x,ou=Users,dc=example,dc=org",
            vec![("uid", vec!["x"]), ("uidNumber", vec!["not-a-number"])],
        );
        assert!(parse_person(broken).is_none());
    }

    #[test]
    fn group_parsing_collects_member_uids() {
        let entry = search_entry(
            "cn=stf-cls,ou=Groups,dc=example,dc=org",
            vec![
                ("cn", vec!["stf-cls"]),
                ("gidNumber", vec!["3020"]),
                ("memberUid", vec!["tanaka-tarou", "suzuki-ichirou"]),
            ],
        );
        let group = parse_group(entry).unwrap();
        assert_eq!(group.gid_number, 3020);
        assert!(group.member_uids.contains("tanaka-tarou"));
        assert_eq!(group.member_uids.len(), 2);
    }

    #[test]
    fn dn_escaping_covers_rfc4514_specials() {
        assert_eq!(escape_dn_value("plain"), "plain");
        assert_eq!(escape_dn_value("a,b"), "a\\,b");
        assert_eq!(escape_dn_value(" lead"), "\\20lead");
        assert_eq!(escape_dn_value("trail "), "trail\\20");
        assert_eq!(escape_dn_value("#hash"), "\\23hash");
        assert_eq!(escape_dn_value("eq=val"), "eq\\=val");
    }
}
