//! Input validation for caller-supplied addresses and configured credentials.

use std::net::IpAddr;

/// Minimum length of an API key accepted in the credential map.
pub const MIN_API_KEY_LEN: usize = 64;

/// Allowed username length range (inclusive).
pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 4..=16;

/// Returns true if `s` is a textual IPv4 or IPv6 address.
pub fn is_valid_ip_address(s: &str) -> bool {
    s.parse::<IpAddr>().is_ok()
}

/// Returns true if `s` is 4 to 16 ASCII letters.
pub fn is_valid_username(s: &str) -> bool {
    USERNAME_LEN.contains(&s.len()) && s.bytes().all(|b| b.is_ascii_alphabetic())
}

/// Returns true if `s` is at least 64 ASCII letters or digits.
pub fn is_strong_api_key(s: &str) -> bool {
    s.len() >= MIN_API_KEY_LEN && s.bytes().all(|b| b.is_ascii_alphanumeric())
}
