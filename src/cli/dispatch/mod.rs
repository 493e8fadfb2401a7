//! Command-line argument dispatch.
//!
//! Maps the parsed subcommand and its validated arguments to an [`Action`].

use crate::cli::{
    actions::{credentials::IssueArgs, login, session::ListArgs, Action},
    commands::{credentials as cred, sessions as sess},
};
use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use std::time::Duration;
use ulid::Ulid;

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a String> {
    matches
        .get_one::<String>(id)
        .with_context(|| format!("missing required argument: --{id}"))
}

fn optional(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.get_one::<String>(id).cloned()
}

fn session_id(matches: &ArgMatches) -> Result<Ulid> {
    matches
        .get_one::<Ulid>(sess::ARG_SESSION)
        .copied()
        .context("missing required argument: --session")
}

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or the subcommand is unknown.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let Some((name, sub)) = matches.subcommand() else {
        bail!("missing subcommand");
    };

    let action = match name {
        cred::CMD_ISSUE => Action::Issue(IssueArgs {
            student_id: required(sub, cred::ARG_STUDENT)?.clone(),
            exam_id: required(sub, cred::ARG_EXAM)?.clone(),
            hardware_id: optional(sub, cred::ARG_HARDWARE_ID),
            computer_name: optional(sub, cred::ARG_COMPUTER_NAME),
            validity_minutes: sub
                .get_one::<u32>(cred::ARG_VALIDITY)
                .copied()
                .context("missing required argument: --validity-minutes")?,
            max_attempts: sub
                .get_one::<u32>(cred::ARG_MAX_ATTEMPTS)
                .copied()
                .context("missing required argument: --max-attempts")?,
            student_name: optional(sub, cred::ARG_STUDENT_NAME),
            lab_id: optional(sub, cred::ARG_LAB),
        }),
        cred::CMD_REVOKE => Action::Revoke {
            student_id: required(sub, cred::ARG_STUDENT)?.clone(),
            exam_id: required(sub, cred::ARG_EXAM)?.clone(),
        },
        cred::CMD_CREDENTIALS => Action::Credentials {
            student_id: optional(sub, cred::ARG_STUDENT),
        },
        cred::CMD_CODE => Action::Code {
            secret: SecretString::from(required(sub, cred::ARG_SECRET)?.as_str()),
        },
        cred::CMD_HARDWARE_ID => Action::HardwareId {
            json: sub.get_flag("json"),
        },
        sess::CMD_LOGIN => Action::Login(login::Args {
            student_id: required(sub, cred::ARG_STUDENT)?.clone(),
            access_token: SecretString::from(required(sub, sess::ARG_TOKEN)?.as_str()),
            code: SecretString::from(required(sub, sess::ARG_CODE)?.as_str()),
            hardware_id: optional(sub, cred::ARG_HARDWARE_ID),
            device_id: optional(sub, sess::ARG_DEVICE_ID),
            hold: sub.get_flag(sess::ARG_HOLD),
            heartbeat_period: Duration::from_secs(
                sub.get_one::<u64>(sess::ARG_HEARTBEAT_SECONDS)
                    .copied()
                    .context("missing required argument: --heartbeat-seconds")?,
            ),
        }),
        sess::CMD_END => Action::End {
            session_id: session_id(sub)?,
            submitted: sub.get_flag(sess::ARG_SUBMITTED),
        },
        sess::CMD_HEARTBEAT => Action::Heartbeat {
            session_id: session_id(sub)?,
        },
        sess::CMD_SESSIONS => Action::Sessions(ListArgs {
            student_id: optional(sub, cred::ARG_STUDENT),
            active_only: sub.get_flag(sess::ARG_ACTIVE),
            stale_after: chrono::Duration::seconds(
                sub.get_one::<i64>(sess::ARG_STALE_AFTER)
                    .copied()
                    .context("missing required argument: --stale-after-seconds")?,
            ),
        }),
        other => bail!("unknown subcommand: {other}"),
    };

    Ok(action)
}
