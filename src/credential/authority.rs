//! Issuance and validation of single-use credentials.

use super::{AuthError, Credential, IssueRequest, ValidatedCredential};
use crate::{
    clock::{Clock, SystemClock},
    store::{Commit, RecordStore},
    totp,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Random bytes behind an access token (24 URL-safe characters).
const ACCESS_TOKEN_BYTES: usize = 18;

pub struct CredentialAuthority<S, C = SystemClock> {
    store: S,
    used_log: Option<S>,
    clock: C,
    window: u32,
}

impl<S, C> CredentialAuthority<S, C>
where
    S: RecordStore<Credential>,
    C: Clock,
{
    #[must_use]
    pub const fn new(store: S, clock: C) -> Self {
        Self {
            store,
            used_log: None,
            clock,
            window: totp::DEFAULT_WINDOW,
        }
    }

    /// Copy every consumed credential into a second store.
    #[must_use]
    pub fn with_used_log(mut self, used_log: S) -> Self {
        self.used_log = Some(used_log);
        self
    }

    /// TOTP steps accepted either side of now.
    #[must_use]
    pub const fn with_window(mut self, window: u32) -> Self {
        self.window = window;
        self
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Create and persist a fresh credential.
    ///
    /// Earlier credentials for the same student stay valid; re-issuing after
    /// a lost token is allowed.
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the record cannot be written.
    #[instrument(skip(self, request), fields(student_id = %request.student_id, exam_id = %request.exam_id))]
    pub fn issue(&self, request: IssueRequest) -> Result<Credential, AuthError> {
        let created_at = self.clock.now();
        let credential = Credential {
            id: Uuid::new_v4(),
            student_id: request.student_id.trim().to_string(),
            student_name: request.student_name.clone(),
            exam_id: request.exam_id.trim().to_string(),
            lab_id: request.lab_id.clone(),
            access_token: generate_access_token(),
            totp_secret: totp::generate_secret(),
            hardware_id: request.hardware_id.clone(),
            computer_name: request.computer_name.clone(),
            created_at,
            expires_at: created_at + request.validity(),
            is_used: false,
            used_at: None,
            used_on_device: None,
            attempts_used: 0,
            max_attempts: request.max_attempts,
        };

        self.store.append(credential.clone())?;

        info!(
            credential_id = %credential.id,
            computer_name = %credential.computer_name,
            expires_at = %credential.expires_at,
            max_attempts = credential.max_attempts,
            "credential issued"
        );
        Ok(credential)
    }

    /// Check a login attempt and consume the credential on success.
    ///
    /// Order: lookup, expiry, hardware, lockout, code. Only the code check
    /// counts against `max_attempts`.
    ///
    /// # Errors
    /// Returns the first failing check, or `StorageUnavailable` if the
    /// updated record cannot be written.
    #[instrument(skip(self, access_token, hardware_id, totp_code))]
    pub fn validate(
        &self,
        student_id: &str,
        access_token: &str,
        hardware_id: &str,
        totp_code: &str,
    ) -> Result<ValidatedCredential, AuthError> {
        let now = self.clock.now();
        let unix_seconds = now.timestamp();
        let window = self.window;

        let outcome = self.store.update(|records| {
            let Some(record) = records
                .iter_mut()
                .filter(|c| !c.is_used && c.access_token == access_token && c.belongs_to(student_id))
                .max_by_key(|c| c.created_at)
            else {
                return Commit::Discard(Err(AuthError::InvalidCredentials));
            };

            if record.is_expired_at(now) {
                return Commit::Discard(Err(AuthError::Expired));
            }
            if record.hardware_id != hardware_id {
                return Commit::Discard(Err(AuthError::HardwareMismatch {
                    bound_to: record.computer_name.clone(),
                }));
            }
            if record.is_locked_out() {
                return Commit::Discard(Err(AuthError::LockedOut));
            }

            record.attempts_used = record.attempts_used.saturating_add(1);
            if !totp::validate_code_at(&record.totp_secret, totp_code, unix_seconds, window) {
                return Commit::Save(Err(AuthError::InvalidCode {
                    remaining_attempts: record.remaining_attempts(),
                }));
            }

            record.is_used = true;
            record.used_at = Some(now);
            record.used_on_device = Some(hardware_id.to_string());
            Commit::Save(Ok(record.clone()))
        })?;

        let credential = outcome.inspect_err(|err| {
            warn!(reason = %err, "credential validation failed");
        })?;

        if let Some(used_log) = &self.used_log {
            if let Err(err) = used_log.append(credential.clone()) {
                warn!(error = %err, "failed to copy credential into used log");
            }
        }

        info!(credential_id = %credential.id, exam_id = %credential.exam_id, "credential validated");
        Ok(ValidatedCredential::from(&credential))
    }

    /// Mark every live credential for `student_id` on `exam_id` as used.
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the store cannot be written.
    #[instrument(skip(self))]
    pub fn revoke(&self, student_id: &str, exam_id: &str) -> Result<usize, AuthError> {
        let now = self.clock.now();
        let revoked = self.store.update(|records| {
            let mut count = 0;
            for record in records
                .iter_mut()
                .filter(|c| !c.is_used && c.belongs_to(student_id) && c.exam_id == exam_id)
            {
                record.is_used = true;
                record.used_at = Some(now);
                count += 1;
            }
            if count == 0 {
                Commit::Discard(0)
            } else {
                Commit::Save(count)
            }
        })?;

        info!(revoked, "credentials revoked");
        Ok(revoked)
    }

    /// All credentials, optionally only those of one student.
    #[must_use]
    pub fn list(&self, student_id: Option<&str>) -> Vec<Credential> {
        let mut credentials = self.store.load();
        if let Some(student_id) = student_id {
            credentials.retain(|c| c.belongs_to(student_id));
        }
        credentials
    }

    #[must_use]
    pub fn find(&self, id: Uuid) -> Option<Credential> {
        self.store.load().into_iter().find(|c| c.id == id)
    }
}

fn generate_access_token() -> String {
    let mut bytes = [0u8; ACCESS_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}
