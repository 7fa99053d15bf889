//! Subcommand implementations and shared option groups.

use clap::Args;

use idsync_connector_ldap::{DirectoryClient, DirectoryConfig};
use idsync_core::{BusinessGroups, ClassTable, ReconcileRules};

use crate::error::{CliError, CliResult};

pub mod groups;
pub mod sync;

/// Directory connection options, shared by every subcommand.
#[derive(Args, Debug)]
pub struct DirectoryOpts {
    /// Directory server hostname
    #[arg(long, env = "IDSYNC_LDAP_HOST")]
    pub ldap_host: String,

    /// Directory server port
    #[arg(long, env = "IDSYNC_LDAP_PORT", default_value_t = 389)]
    pub ldap_port: u16,

    /// Connect with LDAPS
    #[arg(long)]
    pub ldaps: bool,

    /// Upgrade the connection with STARTTLS
    #[arg(long, conflicts_with = "ldaps")]
    pub starttls: bool,

    /// Base DN, e.g. dc=example,dc=org
    #[arg(long, env = "IDSYNC_BASE_DN")]
    pub base_dn: String,

    /// Bind DN for the service account
    #[arg(long, env = "IDSYNC_BIND_DN")]
    pub bind_dn: String,

    /// Bind password
    #[arg(long, env = "IDSYNC_BIND_PASSWORD", hide_env_values = true)]
    pub bind_password: Option<String>,

    /// People container, relative to the base DN
    #[arg(long, default_value = "ou=Users")]
    pub people_ou: String,

    /// Group container, relative to the base DN
    #[arg(long, default_value = "ou=Groups")]
    pub groups_ou: String,
}

impl DirectoryOpts {
    pub fn client(&self) -> CliResult<DirectoryClient> {
        let mut config = DirectoryConfig::new(&self.ldap_host, &self.base_dn, &self.bind_dn);
        config.port = self.ldap_port;
        config.use_ssl = self.ldaps;
        config.use_starttls = self.starttls;
        config.people_ou = self.people_ou.clone();
        config.groups_ou = self.groups_ou.clone();
        config.bind_password = self.bind_password.clone();
        DirectoryClient::new(config).map_err(CliError::from)
    }
}

/// Attribute-shaping options for person entries.
#[derive(Args, Debug)]
pub struct RulesOpts {
    /// Primary mail domain; the login identifier becomes the local part
    #[arg(long, env = "IDSYNC_MAIL_DOMAIN")]
    pub mail_domain: Option<String>,

    /// Additional mail domains the primary address is mirrored into
    #[arg(long = "extra-mail-domain")]
    pub extra_mail_domains: Vec<String>,

    /// Login shell for entries whose source row has none
    #[arg(long, default_value = "/bin/bash")]
    pub default_shell: String,

    /// Base path for derived home directories
    #[arg(long, default_value = "/home")]
    pub home_base: String,
}

impl RulesOpts {
    pub fn rules(&self, directory: &DirectoryOpts, rotate_credentials: bool) -> ReconcileRules {
        ReconcileRules {
            people_base: format!("{},{}", directory.people_ou, directory.base_dn),
            groups_base: format!("{},{}", directory.groups_ou, directory.base_dn),
            class_table: ClassTable::canonical(),
            business_groups: BusinessGroups::canonical(),
            primary_mail_domain: self.mail_domain.clone(),
            extra_mail_domains: self.extra_mail_domains.clone(),
            default_login_shell: self.default_shell.clone(),
            home_base: self.home_base.clone(),
            rotate_credentials,
        }
    }
}
