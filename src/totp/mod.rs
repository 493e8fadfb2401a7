//! Time-based one-time passwords.
//!
//! Everything here is a pure function of `(secret, time)`. The `*_at`
//! functions take Unix seconds explicitly; the short forms read a [`Clock`].

pub mod base32;

use crate::clock::Clock;
use totp_rs::{Algorithm, Secret, TOTP};

/// Code length.
pub const DIGITS: usize = 6;

/// Seconds per TOTP counter step.
pub const TIME_STEP: i64 = 30;

/// Adjacent steps accepted on either side of the current one.
pub const DEFAULT_WINDOW: u32 = 1;

/// Raw secret size in bytes (160 bits).
pub const SECRET_BYTES: usize = 20;

/// `floor(unix_seconds / 30)`.
#[must_use]
pub const fn counter_at(unix_seconds: i64) -> i64 {
    unix_seconds.div_euclid(TIME_STEP)
}

/// SHA-1, six digits, 30 second steps.
///
/// `new_unchecked` because legacy secrets may be shorter than the 128 bits
/// `TOTP::new` insists on.
fn engine(key: Vec<u8>, issuer: Option<&str>, account: &str) -> TOTP {
    TOTP::new_unchecked(
        Algorithm::SHA1,
        DIGITS,
        1,
        TIME_STEP.unsigned_abs(),
        key,
        issuer.map(str::to_string),
        account.to_string(),
    )
}

/// Fresh Base32 secret from the OS random number generator.
#[must_use]
pub fn generate_secret() -> String {
    match Secret::generate_secret() {
        Secret::Raw(bytes) => base32::encode(&bytes),
        Secret::Encoded(encoded) => encoded,
    }
}

/// Code for the step containing `unix_seconds`; empty before the epoch.
#[must_use]
pub fn generate_code_at(secret: &str, unix_seconds: i64) -> String {
    let Ok(time) = u64::try_from(unix_seconds) else {
        return String::new();
    };
    engine(base32::decode(secret), None, "").generate(time)
}

/// Accepts `code` if it matches any counter in
/// `[counter_now - window, counter_now + window]`.
///
/// Counters before the epoch are skipped. A secret that decodes to no key
/// bytes never validates.
#[must_use]
pub fn validate_code_at(secret: &str, code: &str, unix_seconds: i64, window: u32) -> bool {
    let key = base32::decode(secret);
    if key.is_empty() {
        return false;
    }
    let totp = engine(key, None, "");
    let current = counter_at(unix_seconds);
    let window = i64::from(window);

    (-window..=window)
        .filter_map(|offset| current.checked_add(offset))
        .filter_map(|counter| counter.checked_mul(TIME_STEP))
        .filter_map(|step_start| u64::try_from(step_start).ok())
        .any(|step_start| totp.generate(step_start) == code)
}

/// Seconds until the current code rolls over, in `1..=30`.
#[must_use]
pub const fn remaining_seconds_at(unix_seconds: i64) -> i64 {
    TIME_STEP - unix_seconds.rem_euclid(TIME_STEP)
}

pub fn generate_code(secret: &str, clock: &dyn Clock) -> String {
    generate_code_at(secret, clock.unix_seconds())
}

pub fn validate_code(secret: &str, code: &str, clock: &dyn Clock) -> bool {
    validate_code_at(secret, code, clock.unix_seconds(), DEFAULT_WINDOW)
}

pub fn remaining_seconds(clock: &dyn Clock) -> i64 {
    remaining_seconds_at(clock.unix_seconds())
}

/// `otpauth://` URI understood by Google/Microsoft authenticator apps.
#[must_use]
pub fn provisioning_uri(secret: &str, account: &str, issuer: &str) -> String {
    engine(base32::decode(secret), Some(issuer), account).get_url()
}
