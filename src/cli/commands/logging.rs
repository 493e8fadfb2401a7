use clap::{builder::ValueParser, Arg, ArgAction, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names in verbosity order: `-v` count `n` selects `LEVELS[n]`.
///
/// Count 0 means "not set" and falls back to `ERROR`.
pub const LEVELS: [Level; 5] = [
    Level::ERROR,
    Level::WARN,
    Level::INFO,
    Level::DEBUG,
    Level::TRACE,
];

/// Tracing level for a verbosity count; counts past the table stay at `TRACE`.
#[must_use]
pub const fn level_for(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        n if (n as usize) < LEVELS.len() => Some(LEVELS[n as usize]),
        _ => Some(Level::TRACE),
    }
}

/// Accept a level name from `LEVELS` or a count up to `LEVELS.len()`.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        let level = level.trim();
        if let Ok(count) = level.parse::<u8>() {
            return if usize::from(count) <= LEVELS.len() {
                Ok(count)
            } else {
                Err(format!("verbosity count must be at most {}", LEVELS.len()))
            };
        }

        LEVELS
            .iter()
            .position(|known| known.as_str().eq_ignore_ascii_case(level))
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| format!("invalid log level: {level}"))
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("EXAMGATE_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}
