pub mod credentials;
pub mod login;
pub mod run;
pub mod session;
pub mod tools;

use crate::cli::globals::GlobalArgs;
use secrecy::SecretString;
use ulid::Ulid;

#[derive(Debug)]
pub enum Action {
    Issue(credentials::IssueArgs),
    Revoke { student_id: String, exam_id: String },
    Credentials { student_id: Option<String> },
    Code { secret: SecretString },
    HardwareId { json: bool },
    Login(login::Args),
    End { session_id: Ulid, submitted: bool },
    Heartbeat { session_id: Ulid },
    Sessions(session::ListArgs),
}

impl Action {
    /// Execute the action against the stores under `globals.data_dir`.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self, globals: &GlobalArgs) -> anyhow::Result<()> {
        run::execute(self, globals).await
    }
}
