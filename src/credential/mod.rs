//! Issued login credentials.
//!
//! A [`Credential`] is created once by an invigilator and consumed at most
//! once by a student. Records are never deleted; a used, expired or
//! locked-out credential stays in the store as an audit trail.

pub mod authority;

pub use authority::CredentialAuthority;

use crate::store::{timestamp, StoreError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_VALIDITY_MINUTES: u32 = 180;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Persisted credential.
///
/// Field aliases accept record files written by earlier tools
/// (`PascalCase`, `LoginCode` for the token); writes always use these names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default = "Uuid::new_v4", alias = "Id")]
    pub id: Uuid,
    #[serde(alias = "StudentId")]
    pub student_id: String,
    #[serde(default, alias = "StudentName", skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(alias = "ExamId")]
    pub exam_id: String,
    #[serde(default, alias = "LabId", skip_serializing_if = "Option::is_none")]
    pub lab_id: Option<String>,
    #[serde(alias = "AccessToken", alias = "LoginCode")]
    pub access_token: String,
    #[serde(default, alias = "TotpSecret")]
    pub totp_secret: String,
    #[serde(default, alias = "HardwareId")]
    pub hardware_id: String,
    #[serde(default, alias = "ComputerName")]
    pub computer_name: String,
    #[serde(alias = "CreatedAt", deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "ExpiresAt", deserialize_with = "timestamp::deserialize")]
    pub expires_at: DateTime<Utc>,
    #[serde(default, alias = "IsUsed")]
    pub is_used: bool,
    #[serde(
        default,
        alias = "UsedAt",
        deserialize_with = "timestamp::deserialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "DeviceId", skip_serializing_if = "Option::is_none")]
    pub used_on_device: Option<String>,
    #[serde(default, alias = "AttemptsUsed")]
    pub attempts_used: u32,
    #[serde(default = "default_max_attempts", alias = "MaxAttempts")]
    pub max_attempts: u32,
}

impl Credential {
    /// Strictly after `expires_at`. A zero-length window is expired from
    /// the start.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at || self.expires_at <= self.created_at
    }

    #[must_use]
    pub const fn is_locked_out(&self) -> bool {
        self.attempts_used >= self.max_attempts
    }

    #[must_use]
    pub const fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts_used)
    }

    #[must_use]
    pub fn belongs_to(&self, student_id: &str) -> bool {
        same_student(&self.student_id, student_id)
    }
}

/// Student identifiers compare case-insensitively and ignore surrounding
/// whitespace.
#[must_use]
pub fn same_student(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Parameters for [`CredentialAuthority::issue`].
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub student_id: String,
    pub exam_id: String,
    pub hardware_id: String,
    pub computer_name: String,
    pub validity_minutes: u32,
    pub max_attempts: u32,
    pub student_name: Option<String>,
    pub lab_id: Option<String>,
}

impl IssueRequest {
    #[must_use]
    pub fn new(
        student_id: impl Into<String>,
        exam_id: impl Into<String>,
        hardware_id: impl Into<String>,
        computer_name: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            exam_id: exam_id.into(),
            hardware_id: hardware_id.into(),
            computer_name: computer_name.into(),
            validity_minutes: DEFAULT_VALIDITY_MINUTES,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            student_name: None,
            lab_id: None,
        }
    }

    #[must_use]
    pub const fn validity_minutes(mut self, minutes: u32) -> Self {
        self.validity_minutes = minutes;
        self
    }

    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn student_name(mut self, name: impl Into<String>) -> Self {
        self.student_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn lab_id(mut self, lab: impl Into<String>) -> Self {
        self.lab_id = Some(lab.into());
        self
    }

    pub(crate) fn validity(&self) -> Duration {
        Duration::minutes(i64::from(self.validity_minutes))
    }
}

/// What a successful login hands to the exam side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedCredential {
    pub credential_id: Uuid,
    pub student_id: String,
    pub student_name: Option<String>,
    pub exam_id: String,
    pub lab_id: Option<String>,
    pub computer_name: String,
    pub validated_at: DateTime<Utc>,
}

impl From<&Credential> for ValidatedCredential {
    fn from(credential: &Credential) -> Self {
        Self {
            credential_id: credential.id,
            student_id: credential.student_id.clone(),
            student_name: credential.student_name.clone(),
            exam_id: credential.exam_id.clone(),
            lab_id: credential.lab_id.clone(),
            computer_name: credential.computer_name.clone(),
            validated_at: credential.used_at.unwrap_or(credential.created_at),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials. Please check your Student ID and Access Token.")]
    InvalidCredentials,
    #[error("Credentials have expired")]
    Expired,
    #[error("Hardware mismatch - credentials are bound to another system ({bound_to})")]
    HardwareMismatch { bound_to: String },
    #[error("Invalid authentication code. {remaining_attempts} attempts remaining")]
    InvalidCode { remaining_attempts: u32 },
    #[error("Maximum attempts exceeded")]
    LockedOut,
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),
}

impl AuthError {
    /// The credential can never succeed again; only re-issuance helps.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::LockedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Credential {
        let created_at = timestamp::parse("2025-03-01T10:00:00Z").unwrap();
        Credential {
            id: Uuid::new_v4(),
            student_id: "STU001".to_string(),
            student_name: None,
            exam_id: "EXAM001".to_string(),
            lab_id: None,
            access_token: "token".to_string(),
            totp_secret: "JBSWY3DPEHPK3PXP".to_string(),
            hardware_id: "HW1".to_string(),
            computer_name: "PC-1".to_string(),
            created_at,
            expires_at: created_at + Duration::minutes(180),
            is_used: false,
            used_at: None,
            used_on_device: None,
            attempts_used: 0,
            max_attempts: 5,
        }
    }

    #[test]
    fn expiry_is_strict() {
        let credential = sample();
        assert!(!credential.is_expired_at(credential.expires_at));
        assert!(credential.is_expired_at(credential.expires_at + Duration::nanoseconds(1)));
    }

    #[test]
    fn empty_window_is_expired_at_issue_time() {
        let mut credential = sample();
        credential.expires_at = credential.created_at;
        assert!(credential.is_expired_at(credential.created_at));
    }

    #[test]
    fn lockout_and_remaining_attempts() {
        let mut credential = sample();
        credential.attempts_used = 4;
        assert!(!credential.is_locked_out());
        assert_eq!(credential.remaining_attempts(), 1);
        credential.attempts_used = 5;
        assert!(credential.is_locked_out());
        assert_eq!(credential.remaining_attempts(), 0);
    }

    #[test]
    fn student_match_ignores_case_and_padding() {
        assert!(same_student("STU001", " stu001 "));
        assert!(!same_student("STU001", "STU002"));
    }

    #[test]
    fn serializes_with_snake_case_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["student_id"], "STU001");
        assert_eq!(json["expires_at"], "2025-03-01T13:00:00Z");
        assert!(json.get("used_at").is_none());
    }

    #[test]
    fn reads_legacy_pascal_case_records() {
        let legacy = r#"{
            "StudentId": "STU009",
            "StudentName": "Ada",
            "LoginCode": "48151623",
            "ExamId": "EXAM7",
            "LabId": "LAB-2",
            "CreatedAt": "2024-11-05T09:00:00.1234567",
            "ExpiresAt": "2024-11-05T12:00:00",
            "IsUsed": true,
            "DeviceId": "abc",
            "UsedAt": null
        }"#;
        let credential: Credential = serde_json::from_str(legacy).unwrap();
        assert_eq!(credential.student_id, "STU009");
        assert_eq!(credential.access_token, "48151623");
        assert_eq!(credential.lab_id.as_deref(), Some("LAB-2"));
        assert!(credential.is_used);
        assert_eq!(credential.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(credential.totp_secret.is_empty());
    }

    #[test]
    fn terminal_errors() {
        assert!(AuthError::Expired.is_terminal());
        assert!(AuthError::LockedOut.is_terminal());
        assert!(!AuthError::InvalidCode { remaining_attempts: 2 }.is_terminal());
    }

    #[test]
    fn issue_request_defaults() {
        let request = IssueRequest::new("S", "E", "H", "C");
        assert_eq!(request.validity_minutes, 180);
        assert_eq!(request.max_attempts, 5);
        assert_eq!(request.validity(), Duration::minutes(180));
    }
}
