//! Best-effort machine fingerprint used to bind a credential to one device.
//!
//! This is a deterrent against sharing credentials between machines, not an
//! attestation: identifiers are read from the host without privilege and
//! anything unreadable is skipped.

use sha2::{Digest, Sha256};
use std::{fs, path::Path};
use tracing::debug;

/// Returned when no identifier could be read.
pub const UNKNOWN_HARDWARE: &str = "UNKNOWN-HARDWARE";

/// Hex characters kept from the SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 16;

#[cfg(target_os = "linux")]
const IDENTIFIER_SOURCES: &[&str] = &[
    "/sys/class/dmi/id/product_uuid",
    "/sys/class/dmi/id/board_serial",
];

#[cfg(not(target_os = "linux"))]
const IDENTIFIER_SOURCES: &[&str] = &[];

const FALLBACK_SOURCES: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Fingerprint of the current machine.
#[must_use]
pub fn fingerprint() -> String {
    let mut identifiers = read_identifiers(IDENTIFIER_SOURCES);
    if identifiers.is_empty() {
        identifiers = read_identifiers(FALLBACK_SOURCES);
    }
    fingerprint_from(&identifiers)
}

/// Hash already-collected identifiers into the display form.
#[must_use]
pub fn fingerprint_from<S: AsRef<str>>(identifiers: &[S]) -> String {
    if identifiers.is_empty() {
        return UNKNOWN_HARDWARE.to_string();
    }

    let mut hasher = Sha256::new();
    for identifier in identifiers {
        hasher.update(identifier.as_ref().as_bytes());
    }
    let mut hex = hex::encode_upper(hasher.finalize());
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// Host name for diagnostics only.
#[must_use]
pub fn computer_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .or_else(|| read_trimmed(Path::new("/etc/hostname")))
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

fn read_identifiers(sources: &[&str]) -> Vec<String> {
    sources
        .iter()
        .filter_map(|source| {
            let value = read_trimmed(Path::new(source));
            if value.is_none() {
                debug!(source, "hardware identifier unavailable");
            }
            value
        })
        .collect()
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
