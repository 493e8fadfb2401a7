use clap::{builder::ValueParser, Arg, ArgAction, Command};
use regex::Regex;

pub const CMD_ISSUE: &str = "issue";
pub const CMD_REVOKE: &str = "revoke";
pub const CMD_CREDENTIALS: &str = "credentials";
pub const CMD_CODE: &str = "code";
pub const CMD_HARDWARE_ID: &str = "hardware-id";

pub const ARG_STUDENT: &str = "student";
pub const ARG_STUDENT_NAME: &str = "name";
pub const ARG_EXAM: &str = "exam";
pub const ARG_LAB: &str = "lab";
pub const ARG_HARDWARE_ID: &str = "hardware-id";
pub const ARG_COMPUTER_NAME: &str = "computer-name";
pub const ARG_VALIDITY: &str = "validity-minutes";
pub const ARG_MAX_ATTEMPTS: &str = "max-attempts";
pub const ARG_SECRET: &str = "secret";

/// Student and exam identifiers: alphanumeric start, then `.`, `_` or `-`.
#[must_use]
pub fn validator_identifier() -> ValueParser {
    ValueParser::from(move |value: &str| -> std::result::Result<String, String> {
        let value = value.trim();
        match Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,63}$") {
            Ok(re) if re.is_match(value) => Ok(value.to_string()),
            Ok(_) => Err("expected 1-64 letters, digits, '.', '_' or '-'".to_string()),
            Err(e) => Err(e.to_string()),
        }
    })
}

pub(super) fn student_arg() -> Arg {
    Arg::new(ARG_STUDENT)
        .short('s')
        .long(ARG_STUDENT)
        .help("Student ID (case-insensitive)")
        .value_parser(validator_identifier())
}

pub(super) fn exam_arg() -> Arg {
    Arg::new(ARG_EXAM)
        .short('e')
        .long(ARG_EXAM)
        .help("Exam ID")
        .value_parser(validator_identifier())
}

pub(super) fn hardware_id_arg() -> Arg {
    Arg::new(ARG_HARDWARE_ID)
        .long(ARG_HARDWARE_ID)
        .help("Hardware fingerprint (default: this machine)")
}

#[must_use]
pub fn with_subcommands(command: Command) -> Command {
    command
        .subcommand(
            Command::new(CMD_ISSUE)
                .about("Issue a single-use credential bound to one machine")
                .arg(student_arg().required(true))
                .arg(exam_arg().required(true))
                .arg(hardware_id_arg())
                .arg(
                    Arg::new(ARG_COMPUTER_NAME)
                        .long(ARG_COMPUTER_NAME)
                        .help("Computer name shown on hardware mismatch (default: this host)"),
                )
                .arg(
                    Arg::new(ARG_VALIDITY)
                        .long(ARG_VALIDITY)
                        .help("Minutes until the credential expires")
                        .default_value("180")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    Arg::new(ARG_MAX_ATTEMPTS)
                        .long(ARG_MAX_ATTEMPTS)
                        .help("Wrong codes allowed before lockout")
                        .default_value("5")
                        .value_parser(clap::value_parser!(u32).range(1..)),
                )
                .arg(
                    Arg::new(ARG_STUDENT_NAME)
                        .long(ARG_STUDENT_NAME)
                        .help("Student display name"),
                )
                .arg(Arg::new(ARG_LAB).long(ARG_LAB).help("Lab identifier")),
        )
        .subcommand(
            Command::new(CMD_REVOKE)
                .about("Invalidate every live credential of a student for an exam")
                .arg(student_arg().required(true))
                .arg(exam_arg().required(true)),
        )
        .subcommand(
            Command::new(CMD_CREDENTIALS)
                .about("List issued credentials")
                .arg(student_arg()),
        )
        .subcommand(
            Command::new(CMD_CODE)
                .about("Print the current code for a TOTP secret")
                .arg(
                    Arg::new(ARG_SECRET)
                        .long(ARG_SECRET)
                        .help("Base32 TOTP secret")
                        .env("EXAMGATE_TOTP_SECRET")
                        .hide_env_values(true)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new(CMD_HARDWARE_ID)
                .about("Print this machine's hardware fingerprint")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> Command {
        with_subcommands(Command::new("examgate"))
    }

    #[test]
    fn test_issue_defaults() {
        let matches = command().get_matches_from(vec![
            "examgate", "issue", "--student", "STU001", "--exam", "EXAM001",
        ]);
        let sub = matches.subcommand_matches(CMD_ISSUE).unwrap();
        assert_eq!(
            sub.get_one::<String>(ARG_STUDENT).map(String::as_str),
            Some("STU001")
        );
        assert_eq!(
            sub.get_one::<u32>(ARG_VALIDITY).copied(),
            Some(crate::credential::DEFAULT_VALIDITY_MINUTES)
        );
        assert_eq!(
            sub.get_one::<u32>(ARG_MAX_ATTEMPTS).copied(),
            Some(crate::credential::DEFAULT_MAX_ATTEMPTS)
        );
        assert!(sub.get_one::<String>(ARG_HARDWARE_ID).is_none());
    }

    #[test]
    fn test_issue_rejects_bad_ids() {
        let result = command().try_get_matches_from(vec![
            "examgate", "issue", "--student", "STU 001", "--exam", "EXAM001",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_max_attempts_rejected() {
        let result = command().try_get_matches_from(vec![
            "examgate",
            "issue",
            "-s",
            "STU001",
            "-e",
            "EXAM001",
            "--max-attempts",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_code_secret_from_env() {
        temp_env::with_vars([("EXAMGATE_TOTP_SECRET", Some("JBSWY3DPEHPK3PXP"))], || {
            let matches = command().get_matches_from(vec!["examgate", "code"]);
            let sub = matches.subcommand_matches(CMD_CODE).unwrap();
            assert_eq!(
                sub.get_one::<String>(ARG_SECRET).map(String::as_str),
                Some("JBSWY3DPEHPK3PXP")
            );
        });
    }

    #[test]
    fn test_identifier_trimmed() {
        let matches = command().get_matches_from(vec![
            "examgate", "revoke", "--student", " stu001 ", "--exam", "EXAM001",
        ]);
        let sub = matches.subcommand_matches(CMD_REVOKE).unwrap();
        assert_eq!(
            sub.get_one::<String>(ARG_STUDENT).map(String::as_str),
            Some("stu001")
        );
    }
}
