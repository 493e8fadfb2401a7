//! # Examgate (Exam Authentication & Session Authority)
//!
//! `examgate` issues and verifies short-lived login credentials for a
//! supervised exam. A credential is bound to one machine, expires on the
//! wall clock, can be used exactly once, and locks out after a fixed number
//! of wrong one-time codes.
//!
//! ## Credentials
//!
//! An invigilator issues a credential (`access_token` + Base32 TOTP secret)
//! for a student. The student logs in with the token and a 6-digit code from
//! an authenticator app. Validation runs in a fixed order:
//!
//! 1. token + student lookup (newest live match wins),
//! 2. expiry,
//! 3. hardware binding (free, never counted),
//! 4. lockout,
//! 5. TOTP code (counted, rate-limited).
//!
//! ## Sessions
//!
//! A successful login starts a session for the device. At most one session
//! per student is active at any instant; starting on another device takes
//! over and deactivates the previous one.
//!
//! ## Storage
//!
//! All state lives in local JSON files. Every read-modify-write runs inside
//! an exclusive lock on the store file, so concurrent logins can neither both
//! consume the same credential nor leave two sessions active.

pub mod authority;
pub mod cli;
pub mod clock;
pub mod credential;
pub mod hardware;
pub mod session;
pub mod store;
pub mod totp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
