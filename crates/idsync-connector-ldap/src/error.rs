//! Directory connector errors.

use thiserror::Error;

/// Errors from directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Could not reach or negotiate with the directory server.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<ldap3::LdapError>,
    },

    /// The bind DN or password was rejected.
    #[error("directory authentication failed")]
    AuthenticationFailed,

    /// A search did not complete.
    #[error("search under '{base}' failed: {message}")]
    SearchFailed { base: String, message: String },

    /// A write was rejected by the server.
    #[error("write to '{dn}' failed with code {code}: {message}")]
    WriteFailed {
        dn: String,
        code: u32,
        message: String,
    },

    /// The target entry does not exist (LDAP result code 32).
    #[error("entry '{dn}' not found")]
    NotFound { dn: String },

    /// Transport-level protocol error.
    #[error("ldap protocol error")]
    Protocol(#[from] ldap3::LdapError),

    /// The configuration is unusable.
    #[error("invalid directory configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl DirectoryError {
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: ldap3::LdapError,
    ) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Whether retrying the same operation could succeed.
    ///
    /// LDAP result codes 51 (busy), 52 (unavailable), and 53 (unwilling to
    /// perform) are server-side conditions that clear on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Protocol(_) => true,
            Self::WriteFailed { code, .. } => matches!(code, 51 | 52 | 53),
            Self::AuthenticationFailed
            | Self::SearchFailed { .. }
            | Self::NotFound { .. }
            | Self::InvalidConfiguration { .. } => false,
        }
    }

    /// Stable code for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConnectionFailed { .. } => "CONNECTION_FAILED",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::SearchFailed { .. } => "SEARCH_FAILED",
            Self::WriteFailed { .. } => "WRITE_FAILED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::InvalidConfiguration { .. } => "INVALID_CONFIGURATION",
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(DirectoryError::connection_failed("refused").is_transient());
        assert!(DirectoryError::WriteFailed {
            dn: "uid=x".into(),
            code: 51,
            message: "busy".into()
        }
        .is_transient());
        assert!(!DirectoryError::AuthenticationFailed.is_transient());
        assert!(!DirectoryError::NotFound { dn: "uid=x".into() }.is_transient());
        assert!(!DirectoryError::WriteFailed {
            dn: "uid=x".into(),
            code: 19,
            message: "constraint".into()
        }
        .is_transient());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            DirectoryError::AuthenticationFailed.error_code(),
            "AUTHENTICATION_FAILED"
        );
        assert_eq!(
            DirectoryError::NotFound { dn: "x".into() }.error_code(),
            "NOT_FOUND"
        );
    }
}
