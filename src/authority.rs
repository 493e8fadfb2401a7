//! Login orchestration.
//!
//! [`Authority`] owns both the credential and the session side and is the
//! only place where they meet: a credential is validated first, and only a
//! successful validation starts a session for the device.

use crate::{
    clock::{Clock, SystemClock},
    credential::{AuthError, Credential, CredentialAuthority, ValidatedCredential},
    session::{Session, SessionRegistry, SessionStart, StartRequest},
    store::{JsonFileStore, RecordStore, StoreError},
};
use std::path::{Path, PathBuf};
use tracing::instrument;

pub const CREDENTIALS_FILE: &str = "credentials.json";
pub const USED_CREDENTIALS_FILE: &str = "used_credentials.json";
pub const SESSIONS_FILE: &str = "sessions.json";

/// Store file locations under one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub credentials: PathBuf,
    pub used_credentials: PathBuf,
    pub sessions: PathBuf,
}

impl StorePaths {
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            credentials: data_dir.join(CREDENTIALS_FILE),
            used_credentials: data_dir.join(USED_CREDENTIALS_FILE),
            sessions: data_dir.join(SESSIONS_FILE),
        }
    }
}

/// One login attempt.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub student_id: String,
    pub access_token: String,
    pub totp_code: String,
    pub hardware_id: String,
    /// Device the session is bound to; the hardware id unless set.
    pub device_id: Option<String>,
    pub computer_name: String,
}

impl LoginRequest {
    fn device_id(&self) -> &str {
        self.device_id.as_deref().unwrap_or(&self.hardware_id)
    }
}

#[derive(Debug, Clone)]
pub struct Login {
    pub credential: ValidatedCredential,
    pub session: SessionStart,
}

pub type FileAuthority<C = SystemClock> =
    Authority<JsonFileStore<Credential>, JsonFileStore<Session>, C>;

pub struct Authority<CS, SS, C = SystemClock> {
    credentials: CredentialAuthority<CS, C>,
    sessions: SessionRegistry<SS, C>,
}

impl<C: Clock + Clone> FileAuthority<C> {
    /// Open (creating if needed) the stores under `data_dir`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn open(data_dir: &Path, clock: C) -> Result<Self, StoreError> {
        let paths = StorePaths::new(data_dir);
        let credentials = CredentialAuthority::new(JsonFileStore::open(paths.credentials)?, clock.clone())
            .with_used_log(JsonFileStore::open(paths.used_credentials)?);
        let sessions = SessionRegistry::new(JsonFileStore::open(paths.sessions)?, clock);
        Ok(Self::from_parts(credentials, sessions))
    }
}

impl<CS, SS, C> Authority<CS, SS, C>
where
    CS: RecordStore<Credential>,
    SS: RecordStore<Session>,
    C: Clock,
{
    #[must_use]
    pub const fn from_parts(
        credentials: CredentialAuthority<CS, C>,
        sessions: SessionRegistry<SS, C>,
    ) -> Self {
        Self {
            credentials,
            sessions,
        }
    }

    #[must_use]
    pub const fn credentials(&self) -> &CredentialAuthority<CS, C> {
        &self.credentials
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionRegistry<SS, C> {
        &self.sessions
    }

    /// Validate the credential, then start (or resume) the session.
    ///
    /// The credential is consumed before the session is started; if the
    /// session write fails the credential stays used and the error is
    /// reported as `StorageUnavailable`.
    ///
    /// # Errors
    /// Any [`AuthError`] from validation, or `StorageUnavailable`.
    #[instrument(skip(self, request), fields(student_id = %request.student_id))]
    pub fn login(&self, request: &LoginRequest) -> Result<Login, AuthError> {
        let credential = self.credentials.validate(
            &request.student_id,
            &request.access_token,
            &request.hardware_id,
            &request.totp_code,
        )?;

        let session = self
            .sessions
            .start(StartRequest::new(
                credential.student_id.clone(),
                credential.exam_id.clone(),
                request.device_id(),
                request.computer_name.clone(),
            ))?;

        Ok(Login {
            credential,
            session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, credential::IssueRequest, store::MemoryStore, totp};

    type MemoryAuthority = Authority<MemoryStore<Credential>, MemoryStore<Session>, ManualClock>;

    fn authority() -> (MemoryAuthority, ManualClock) {
        let clock = ManualClock::at_unix(1_740_823_200);
        let authority = Authority::from_parts(
            CredentialAuthority::new(MemoryStore::new(), clock.clone()),
            SessionRegistry::new(MemoryStore::new(), clock.clone()),
        );
        (authority, clock)
    }

    fn request(credential: &Credential, clock: &ManualClock, hardware_id: &str) -> LoginRequest {
        LoginRequest {
            student_id: credential.student_id.clone(),
            access_token: credential.access_token.clone(),
            totp_code: totp::generate_code(&credential.totp_secret, clock),
            hardware_id: hardware_id.to_string(),
            device_id: None,
            computer_name: "PC-1".to_string(),
        }
    }

    #[test]
    fn login_starts_session_on_hardware_device() {
        let (authority, clock) = authority();
        let credential = authority
            .credentials()
            .issue(IssueRequest::new("STU001", "EXAM001", "HW1", "PC-1"))
            .unwrap();

        let login = authority.login(&request(&credential, &clock, "HW1")).unwrap();
        assert_eq!(login.credential.exam_id, "EXAM001");
        assert_eq!(login.session.session.device_id, "HW1");
        assert_eq!(login.session.session.exam_id, "EXAM001");
        assert!(authority.sessions().is_live(login.session.session.session_id));
    }

    #[test]
    fn failed_validation_starts_nothing() {
        let (authority, clock) = authority();
        let credential = authority
            .credentials()
            .issue(IssueRequest::new("STU001", "EXAM001", "HW1", "PC-1"))
            .unwrap();

        let err = authority
            .login(&request(&credential, &clock, "HW2"))
            .unwrap_err();
        assert!(matches!(err, AuthError::HardwareMismatch { .. }));
        assert!(authority.sessions().list().is_empty());
    }

    #[test]
    fn login_from_second_machine_takes_over() {
        let (authority, clock) = authority();
        let first = authority
            .credentials()
            .issue(IssueRequest::new("STU001", "EXAM001", "HW1", "PC-1"))
            .unwrap();
        let second = authority
            .credentials()
            .issue(IssueRequest::new("STU001", "EXAM001", "HW2", "PC-2"))
            .unwrap();

        let a = authority.login(&request(&first, &clock, "HW1")).unwrap();
        let b = authority.login(&request(&second, &clock, "HW2")).unwrap();

        assert_eq!(b.session.taken_over.len(), 1);
        assert!(!authority.sessions().is_live(a.session.session.session_id));
        assert_eq!(authority.sessions().active_for("stu001").unwrap().device_id, "HW2");
    }

    #[test]
    fn explicit_device_id_overrides_hardware() {
        let (authority, clock) = authority();
        let credential = authority
            .credentials()
            .issue(IssueRequest::new("STU001", "EXAM001", "HW1", "PC-1"))
            .unwrap();
        let mut login = request(&credential, &clock, "HW1");
        login.device_id = Some("kiosk-7".to_string());
        let login = authority.login(&login).unwrap();
        assert_eq!(login.session.session.device_id, "kiosk-7");
    }

    #[test]
    fn store_paths_layout() {
        let paths = StorePaths::new(Path::new("/data"));
        assert_eq!(paths.credentials, Path::new("/data/credentials.json"));
        assert_eq!(paths.used_credentials, Path::new("/data/used_credentials.json"));
        assert_eq!(paths.sessions, Path::new("/data/sessions.json"));
    }
}
