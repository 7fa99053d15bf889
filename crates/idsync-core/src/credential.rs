//! Credential hashing for directory storage.
//!
//! Plaintext source credentials are hashed with salted SHA-1 (`{SSHA}`) for
//! `userPassword` and with MD4 over UTF-16LE for the NT hash attribute.
//! Values that already carry a `{SCHEME}` prefix are stored verbatim. Hashes
//! are only written on create or explicit rotation; routine runs never
//! compare or rewrite them.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use md4::{Digest as Md4Digest, Md4};
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;

const SSHA_SALT_LEN: usize = 8;

/// Whether the value is already a `{SCHEME}`-prefixed directory hash.
pub fn is_hashed(value: &str) -> bool {
    value.starts_with('{')
        && value[1..]
            .split_once('}')
            .is_some_and(|(scheme, rest)| !scheme.is_empty() && !rest.is_empty())
}

/// Salted SHA-1 with a fresh random salt.
pub fn ssha_hash(plaintext: &str) -> String {
    let mut salt = [0u8; SSHA_SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    ssha_with_salt(plaintext, &salt)
}

/// Salted SHA-1 with a caller-supplied salt. `digest = sha1(plaintext || salt)`,
/// stored as `{SSHA}base64(digest || salt)`.
pub fn ssha_with_salt(plaintext: &str, salt: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(plaintext.as_bytes());
    hasher.update(salt);
    let digest = hasher.finalize();

    let mut payload = Vec::with_capacity(digest.len() + salt.len());
    payload.extend_from_slice(&digest);
    payload.extend_from_slice(salt);
    format!("{{SSHA}}{}", BASE64.encode(payload))
}

/// Verify a plaintext against an `{SSHA}` hash. Used by tests and the
/// rotation path to avoid rewriting an unchanged credential.
pub fn ssha_verify(plaintext: &str, stored: &str) -> bool {
    let Some(encoded) = stored.strip_prefix("{SSHA}") else {
        return false;
    };
    let Ok(payload) = BASE64.decode(encoded) else {
        return false;
    };
    if payload.len() <= 20 {
        return false;
    }
    let salt = &payload[20..];
    ssha_with_salt(plaintext, salt) == stored
}

/// NT hash: MD4 over the UTF-16LE encoding, uppercase hex.
pub fn nt_hash(plaintext: &str) -> String {
    let mut hasher = Md4::new();
    for unit in plaintext.encode_utf16() {
        hasher.update(unit.to_le_bytes());
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for byte in digest {
        out.push_str(&format!("{byte:02X}"));
    }
    out
}

/// Prepared credential values for one directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCredential {
    pub user_password: String,
    /// Absent when the source value was pre-hashed, since the plaintext is
    /// not recoverable.
    pub nt_password: Option<String>,
}

/// Prepare a source credential for storage.
///
/// Pre-hashed values pass through untouched; plaintext is hashed both ways.
pub fn prepare_credential(raw: &str) -> PreparedCredential {
    if is_hashed(raw) {
        PreparedCredential {
            user_password: raw.to_string(),
            nt_password: None,
        }
    } else {
        PreparedCredential {
            user_password: ssha_hash(raw),
            nt_password: Some(nt_hash(raw)),
        }
    }
}

/// Unusable placeholder stored when the source carries no credential, so a
/// created entry never has an empty `userPassword`.
pub fn locked_credential() -> String {
    let mut noise = [0u8; 24];
    OsRng.fill_bytes(&mut noise);
    format!("{{SSHA}}!{}", BASE64.encode(noise))
}
