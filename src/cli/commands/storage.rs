use clap::{Arg, Command};
use std::path::PathBuf;

pub const ARG_DATA_DIR: &str = "data-dir";
pub const ARG_LOG_DIR: &str = "log-dir";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DATA_DIR)
                .long(ARG_DATA_DIR)
                .help("Directory holding credentials.json, used_credentials.json and sessions.json")
                .env("EXAMGATE_DATA_DIR")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_LOG_DIR)
                .long(ARG_LOG_DIR)
                .help("Directory for examgate.log (default: <data-dir>/logs)")
                .env("EXAMGATE_LOG_DIR")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
}
