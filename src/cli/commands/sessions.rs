use super::credentials::{hardware_id_arg, student_arg};
use clap::{builder::ValueParser, Arg, ArgAction, Command};
use regex::Regex;
use ulid::Ulid;

pub const CMD_LOGIN: &str = "login";
pub const CMD_END: &str = "end";
pub const CMD_HEARTBEAT: &str = "heartbeat";
pub const CMD_SESSIONS: &str = "sessions";

pub const ARG_TOKEN: &str = "token";
pub const ARG_CODE: &str = "code";
pub const ARG_DEVICE_ID: &str = "device-id";
pub const ARG_HOLD: &str = "hold";
pub const ARG_HEARTBEAT_SECONDS: &str = "heartbeat-seconds";
pub const ARG_SESSION: &str = "session";
pub const ARG_SUBMITTED: &str = "submitted";
pub const ARG_ACTIVE: &str = "active";
pub const ARG_STALE_AFTER: &str = "stale-after-seconds";

/// Six-digit authenticator code.
#[must_use]
pub fn validator_code() -> ValueParser {
    ValueParser::from(move |code: &str| -> std::result::Result<String, String> {
        let code = code.trim();
        match Regex::new(r"^\d{6}$") {
            Ok(re) if re.is_match(code) => Ok(code.to_string()),
            Ok(_) => Err("authentication code must be 6 digits".to_string()),
            Err(e) => Err(e.to_string()),
        }
    })
}

#[must_use]
pub fn validator_session_id() -> ValueParser {
    ValueParser::from(move |id: &str| -> std::result::Result<Ulid, String> {
        Ulid::from_string(id.trim()).map_err(|e| format!("invalid session id: {e}"))
    })
}

fn session_arg() -> Arg {
    Arg::new(ARG_SESSION)
        .long(ARG_SESSION)
        .help("Session ID")
        .env("EXAMGATE_SESSION_ID")
        .required(true)
        .value_parser(validator_session_id())
}

#[must_use]
pub fn with_subcommands(command: Command) -> Command {
    command
        .subcommand(
            Command::new(CMD_LOGIN)
                .about("Validate a credential and start the exam session on this device")
                .arg(student_arg().required(true))
                .arg(
                    Arg::new(ARG_TOKEN)
                        .short('t')
                        .long(ARG_TOKEN)
                        .help("Access token")
                        .env("EXAMGATE_ACCESS_TOKEN")
                        .hide_env_values(true)
                        .required(true),
                )
                .arg(
                    Arg::new(ARG_CODE)
                        .short('c')
                        .long(ARG_CODE)
                        .help("6-digit code from the authenticator app")
                        .required(true)
                        .value_parser(validator_code()),
                )
                .arg(hardware_id_arg())
                .arg(
                    Arg::new(ARG_DEVICE_ID)
                        .long(ARG_DEVICE_ID)
                        .help("Device the session is bound to (default: the hardware fingerprint)"),
                )
                .arg(
                    Arg::new(ARG_HOLD)
                        .long(ARG_HOLD)
                        .help("Keep the session alive with heartbeats until Ctrl-C")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new(ARG_HEARTBEAT_SECONDS)
                        .long(ARG_HEARTBEAT_SECONDS)
                        .help("Seconds between heartbeats while holding")
                        .default_value("60")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                ),
        )
        .subcommand(
            Command::new(CMD_END)
                .about("End a session")
                .arg(session_arg())
                .arg(
                    Arg::new(ARG_SUBMITTED)
                        .long(ARG_SUBMITTED)
                        .help("The exam was handed in")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new(CMD_HEARTBEAT)
                .about("Record one heartbeat for a session")
                .arg(session_arg()),
        )
        .subcommand(
            Command::new(CMD_SESSIONS)
                .about("List sessions")
                .arg(student_arg())
                .arg(
                    Arg::new(ARG_ACTIVE)
                        .long(ARG_ACTIVE)
                        .help("Only active sessions")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new(ARG_STALE_AFTER)
                        .long(ARG_STALE_AFTER)
                        .help("Flag active sessions silent for longer than this")
                        .default_value("180")
                        .value_parser(clap::value_parser!(i64).range(1..)),
                ),
        )
}
