//! `-v` / `RELIER_LOG_LEVEL` handling.
//!
//! Repeating `-v` and naming a level in the environment land on the same
//! verbosity count, which [`tracing_level`] turns into a filter level.

use clap::{builder::ValueParser, Arg, ArgAction, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names in verbosity order; the index is the `-v` count.
pub const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accept a level name (any case) or its verbosity count.
///
/// # Errors
/// Returns a message listing the accepted names.
pub fn parse_verbosity(level: &str) -> Result<u8, String> {
    let level = level.trim().to_ascii_lowercase();

    LEVELS
        .iter()
        .zip(0u8..)
        .find(|(name, count)| **name == level || count.to_string() == level)
        .map(|(_, count)| count)
        .ok_or_else(|| format!("invalid log level, expected one of: {}", LEVELS.join(", ")))
}

/// `None` keeps the default `error` filter.
#[must_use]
pub const fn tracing_level(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log level, repeat -v or name one of: error, warn, info, debug, trace")
            .env("RELIER_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(ValueParser::from(parse_verbosity)),
    )
}
