//! Directory connection configuration.

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};

/// Configuration for the directory connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Directory server hostname or IP address.
    pub host: String,

    /// Server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Use LDAPS.
    #[serde(default)]
    pub use_ssl: bool,

    /// Upgrade a plain connection with STARTTLS.
    #[serde(default)]
    pub use_starttls: bool,

    /// Base DN for all operations, e.g. `dc=example,dc=org`.
    pub base_dn: String,

    /// Bind DN for the service account.
    pub bind_dn: String,

    /// Bind password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// People container, relative to `base_dn`.
    #[serde(default = "default_people_ou")]
    pub people_ou: String,

    /// Group container, relative to `base_dn`.
    #[serde(default = "default_groups_ou")]
    pub groups_ou: String,

    /// Connection timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub connection_timeout_secs: u64,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("use_starttls", &self.use_starttls)
            .field("base_dn", &self.base_dn)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("people_ou", &self.people_ou)
            .field("groups_ou", &self.groups_ou)
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .finish()
    }
}

fn default_port() -> u16 {
    389
}

fn default_people_ou() -> String {
    "ou=Users".to_string()
}

fn default_groups_ou() -> String {
    "ou=Groups".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl DirectoryConfig {
    pub fn new(
        host: impl Into<String>,
        base_dn: impl Into<String>,
        bind_dn: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            use_ssl: false,
            use_starttls: false,
            base_dn: base_dn.into(),
            bind_dn: bind_dn.into(),
            bind_password: None,
            people_ou: default_people_ou(),
            groups_ou: default_groups_ou(),
            connection_timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.bind_password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.use_ssl = true;
        self.port = 636;
        self
    }

    /// Connection URL.
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Full DN of the people container.
    #[must_use]
    pub fn people_base(&self) -> String {
        format!("{},{}", self.people_ou, self.base_dn)
    }

    /// Full DN of the group container.
    #[must_use]
    pub fn groups_base(&self) -> String {
        format!("{},{}", self.groups_ou, self.base_dn)
    }

    pub fn validate(&self) -> DirectoryResult<()> {
        if self.host.is_empty() {
            return Err(DirectoryError::invalid_configuration("host is required"));
        }
        if self.base_dn.is_empty() {
            return Err(DirectoryError::invalid_configuration("base_dn is required"));
        }
        if self.bind_dn.is_empty() {
            return Err(DirectoryError::invalid_configuration("bind_dn is required"));
        }
        if self.use_ssl && self.use_starttls {
            return Err(DirectoryError::invalid_configuration(
                "use_ssl and use_starttls are mutually exclusive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containers_compose_with_the_base_dn() {
        let config = DirectoryConfig::new("ldap.example.org", "dc=example,dc=org", "cn=admin");
        assert_eq!(config.people_base(), "ou=Users,dc=example,dc=org");
        assert_eq!(config.groups_base(), "ou=Groups,dc=example,dc=org");
        assert_eq!(config.url(), "ldap://ldap.example.org:389");
    }

    #[test]
    fn ssl_switches_scheme_and_port() {
        let config =
            DirectoryConfig::new("ldap.example.org", "dc=example,dc=org", "cn=admin").with_ssl();
        assert_eq!(config.url(), "ldaps://ldap.example.org:636");
    }

    #[test]
    fn validation_rejects_conflicting_tls_modes() {
        let mut config = DirectoryConfig::new("h", "dc=x", "cn=a");
        config.use_ssl = true;
        config.use_starttls = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_the_password() {
        let config = DirectoryConfig::new("h", "dc=x", "cn=a").with_password("secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("***REDACTED***"));
    }
}
