use crate::cli::{
    actions::{credentials, login, session, tools, Action},
    globals::GlobalArgs,
};
use anyhow::Result;

/// Execute the provided action.
// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Issue(args) => credentials::issue(args, globals),
        Action::Revoke {
            student_id,
            exam_id,
        } => credentials::revoke(&student_id, &exam_id, globals),
        Action::Credentials { student_id } => credentials::list(student_id.as_deref(), globals),
        Action::Code { secret } => tools::code(&secret),
        Action::HardwareId { json } => tools::hardware_id(json),
        Action::Login(args) => login::execute(args, globals).await,
        Action::End {
            session_id,
            submitted,
        } => session::end(session_id, submitted, globals),
        Action::Heartbeat { session_id } => session::heartbeat(session_id, globals),
        Action::Sessions(args) => session::list(&args, globals),
    }
}
