use crate::{
    cli::globals::GlobalArgs,
    clock::{Clock, SystemClock},
    credential::{Credential, IssueRequest},
    hardware, totp,
};
use anyhow::Result;
use chrono::{DateTime, Utc};

const ISSUER: &str = "Examgate";

#[derive(Debug)]
pub struct IssueArgs {
    pub student_id: String,
    pub exam_id: String,
    pub hardware_id: Option<String>,
    pub computer_name: Option<String>,
    pub validity_minutes: u32,
    pub max_attempts: u32,
    pub student_name: Option<String>,
    pub lab_id: Option<String>,
}

impl IssueArgs {
    /// Unset machine fields default to the machine running the command.
    fn into_request(self) -> IssueRequest {
        let mut request = IssueRequest::new(
            self.student_id,
            self.exam_id,
            self.hardware_id.unwrap_or_else(hardware::fingerprint),
            self.computer_name.unwrap_or_else(hardware::computer_name),
        )
        .validity_minutes(self.validity_minutes)
        .max_attempts(self.max_attempts);
        request.student_name = self.student_name;
        request.lab_id = self.lab_id;
        request
    }
}

/// Issue a credential and print everything the student needs.
///
/// # Errors
/// Returns an error if the credential store cannot be written.
pub fn issue(args: IssueArgs, globals: &GlobalArgs) -> Result<()> {
    let authority = globals.authority()?;
    let credential = authority.credentials().issue(args.into_request())?;

    let uri = totp::provisioning_uri(&credential.totp_secret, &credential.student_id, ISSUER);

    println!("Credential issued");
    println!("  id:           {}", credential.id);
    match &credential.student_name {
        Some(name) => println!("  student:      {} ({name})", credential.student_id),
        None => println!("  student:      {}", credential.student_id),
    }
    println!("  exam:         {}", credential.exam_id);
    if let Some(lab) = &credential.lab_id {
        println!("  lab:          {lab}");
    }
    println!("  access token: {}", credential.access_token);
    println!("  totp secret:  {}", credential.totp_secret);
    println!("  otpauth uri:  {uri}");
    println!(
        "  bound to:     {} ({})",
        credential.computer_name, credential.hardware_id
    );
    println!("  expires at:   {}", credential.expires_at);
    println!("  max attempts: {}", credential.max_attempts);

    Ok(())
}

/// # Errors
/// Returns an error if the credential store cannot be written.
pub fn revoke(student_id: &str, exam_id: &str, globals: &GlobalArgs) -> Result<()> {
    let authority = globals.authority()?;
    let revoked = authority.credentials().revoke(student_id, exam_id)?;
    println!("Revoked {revoked} credential(s) for {student_id} on {exam_id}");
    Ok(())
}

/// # Errors
/// Returns an error if the data directory cannot be opened.
pub fn list(student_id: Option<&str>, globals: &GlobalArgs) -> Result<()> {
    let authority = globals.authority()?;
    let now = SystemClock.now();

    let mut credentials = authority.credentials().list(student_id);
    credentials.sort_by_key(|c| c.created_at);

    if credentials.is_empty() {
        println!("No credentials");
        return Ok(());
    }
    for credential in &credentials {
        println!(
            "{}  {:<12} {:<12} {:<8} attempts {}/{}  expires {}  {}",
            credential.id,
            credential.student_id,
            credential.exam_id,
            status(credential, now),
            credential.attempts_used,
            credential.max_attempts,
            credential.expires_at,
            credential.computer_name,
        );
    }
    Ok(())
}

fn status(credential: &Credential, now: DateTime<Utc>) -> &'static str {
    if credential.is_used {
        "used"
    } else if credential.is_expired_at(now) {
        "expired"
    } else if credential.is_locked_out() {
        "locked"
    } else {
        "live"
    }
}
