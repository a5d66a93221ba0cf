pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

pub const ARG_EVENT: &str = "event";
pub const ARG_ACCOUNT: &str = "account";
pub const ARG_CONTEXT: &str = "context";
pub const ARG_SERVICE: &str = "service";
pub const ARG_IFRAME: &str = "iframe";
pub const ARG_REQUEST_TIMEOUT_MS: &str = "request-timeout-ms";

pub const EVENTS: [&str; 5] = [
    "loaded",
    "sign-in",
    "sign-out",
    "change-password",
    "delete-account",
];

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let command = Command::new("relier")
        .about("Relay account lifecycle events to an embedding host")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_EVENT)
                .short('e')
                .long("event")
                .help("Lifecycle event to relay")
                .value_parser(EVENTS)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCOUNT)
                .short('a')
                .long("account")
                .help("Path to the account JSON file")
                .required(true),
        )
        .arg(
            Arg::new(ARG_CONTEXT)
                .short('c')
                .long("context")
                .help("Integration context, example: fx_desktop_v2")
                .env("RELIER_CONTEXT"),
        )
        .arg(
            Arg::new(ARG_SERVICE)
                .short('s')
                .long("service")
                .help("Service the user is signing in to, example: sync")
                .env("RELIER_SERVICE"),
        )
        .arg(
            Arg::new(ARG_IFRAME)
                .long("iframe")
                .help("The page runs inside an iframe")
                .env("RELIER_IFRAME")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT_MS)
                .long("request-timeout-ms")
                .help("Milliseconds to wait for a host reply")
                .default_value("30000")
                .env("RELIER_REQUEST_TIMEOUT_MS")
                .value_parser(clap::value_parser!(u64)),
        );

    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_VARS: [&str; 6] = [
        "RELIER_CONTEXT",
        "RELIER_SERVICE",
        "RELIER_IFRAME",
        "RELIER_REQUEST_TIMEOUT_MS",
        "RELIER_LOG_LEVEL",
        "RUST_LOG",
    ];

    fn clean_env() -> Vec<(&'static str, Option<&'static str>)> {
        ENV_VARS.iter().map(|name| (*name, None)).collect()
    }

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "relier");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Relay account lifecycle events to an embedding host".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(clean_env(), || {
            let matches = new().get_matches_from(vec![
                "relier",
                "--event",
                "loaded",
                "--account",
                "/tmp/account.json",
            ]);

            assert_eq!(
                matches.get_one::<String>(ARG_EVENT).cloned(),
                Some("loaded".to_string())
            );
            assert_eq!(
                matches.get_one::<u64>(ARG_REQUEST_TIMEOUT_MS).copied(),
                Some(30_000)
            );
            assert!(!matches.get_flag(ARG_IFRAME));
            assert_eq!(matches.get_one::<String>(ARG_CONTEXT), None);
        });
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let result = new().try_get_matches_from(vec![
            "relier",
            "--event",
            "reboot",
            "--account",
            "/tmp/account.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("RELIER_CONTEXT", Some("fx_desktop_v2")),
                ("RELIER_SERVICE", Some("sync")),
                ("RELIER_IFRAME", Some("true")),
                ("RELIER_REQUEST_TIMEOUT_MS", Some("500")),
                ("RELIER_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec![
                    "relier",
                    "--event",
                    "sign-in",
                    "--account",
                    "/tmp/account.json",
                ]);

                assert_eq!(
                    matches.get_one::<String>(ARG_CONTEXT).cloned(),
                    Some("fx_desktop_v2".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_SERVICE).cloned(),
                    Some("sync".to_string())
                );
                assert!(matches.get_flag(ARG_IFRAME));
                assert_eq!(matches.get_one::<u64>(ARG_REQUEST_TIMEOUT_MS).copied(), Some(500));
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        for (index, &level) in logging::LEVELS.iter().enumerate() {
            temp_env::with_vars([("RELIER_LOG_LEVEL", Some(level))], || {
                let matches = new().get_matches_from(vec![
                    "relier",
                    "--event",
                    "loaded",
                    "--account",
                    "/tmp/account.json",
                ]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(index as u8)
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..logging::LEVELS.len() {
            temp_env::with_vars([("RELIER_LOG_LEVEL", None::<String>)], || {
                let mut args = vec![
                    "relier".to_string(),
                    "--event".to_string(),
                    "loaded".to_string(),
                    "--account".to_string(),
                    "/tmp/account.json".to_string(),
                ];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(index as u8)
                );
            });
        }
    }
}
