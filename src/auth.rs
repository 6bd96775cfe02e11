//! Caller authentication against the configured credential map.

use axum::http::HeaderMap;
use std::collections::BTreeMap;

/// Request header carrying the caller's API key.
pub const KEY_HEADER: &str = "key";

/// Why a caller was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No key supplied, or more than one.
    #[error("no API key supplied in the \"Key\" request header")]
    MissingCredential,

    /// The key matches no configured user.
    #[error("provided API key is invalid")]
    InvalidCredential,
}

/// Username -> API key pairs accepted by this gateway.
///
/// Read-only after startup.
#[derive(Debug, Clone, Default)]
pub struct CredentialMap {
    entries: BTreeMap<String, String>,
}

impl CredentialMap {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check a supplied key and return the username it belongs to.
    ///
    /// An empty key counts as missing. The map is small, so this is a linear
    /// scan by value.
    pub fn authorize(&self, supplied_key: &str) -> Result<&str, AuthError> {
        if supplied_key.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        self.entries
            .iter()
            .find(|(_, key)| key.as_str() == supplied_key)
            .map(|(user, _)| user.as_str())
            .ok_or(AuthError::InvalidCredential)
    }
}

impl From<BTreeMap<String, String>> for CredentialMap {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self::new(entries)
    }
}

/// The key supplied in the `Key` header.
///
/// Returns an empty string when the header is absent, repeated, or not valid
/// visible ASCII, so all of those fail as a missing credential.
pub fn supplied_key(headers: &HeaderMap) -> &str {
    let mut values = headers.get_all(KEY_HEADER).iter();
    match (values.next(), values.next()) {
        (Some(value), None) => value.to_str().unwrap_or(""),
        _ => "",
    }
}
