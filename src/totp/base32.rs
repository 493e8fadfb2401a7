//! Lenient reading of Base32 secrets as typed into authenticator apps.
//!
//! Decoding itself is `totp_rs`; this module only decides which characters
//! count.

use totp_rs::Secret;

/// Keep only Base32 symbols, upper-cased.
///
/// Spaces, hyphens, `=` padding and any other character outside the
/// RFC 4648 alphabet are skipped rather than rejected.
#[must_use]
pub fn normalize(encoded: &str) -> String {
    encoded
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .filter(|c| matches!(c, 'A'..='Z' | '2'..='7'))
        .collect()
}

/// Decode leniently. Leftover bits that do not fill a byte are dropped.
#[must_use]
pub fn decode(encoded: &str) -> Vec<u8> {
    Secret::Encoded(normalize(encoded))
        .to_bytes()
        .unwrap_or_default()
}

/// Encode raw key bytes without `=` padding.
#[must_use]
pub fn encode(data: &[u8]) -> String {
    match Secret::Raw(data.to_vec()).to_encoded() {
        Secret::Encoded(encoded) => encoded,
        Secret::Raw(_) => String::new(),
    }
}
