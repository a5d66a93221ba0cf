//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to an action carrying its full [`Config`].

use crate::{
    broker::ContextQuery,
    cli::{
        actions::{notify, Action},
        commands::{
            ARG_ACCOUNT, ARG_CONTEXT, ARG_EVENT, ARG_IFRAME, ARG_REQUEST_TIMEOUT_MS, ARG_SERVICE,
        },
    },
    config::{Config, DEFAULT_REQUEST_TIMEOUT},
};
use anyhow::{Context, Result};
use std::{path::PathBuf, time::Duration};

/// Map validated CLI matches to a notify action.
///
/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let event = matches
        .get_one::<String>(ARG_EVENT)
        .context("missing required argument: --event")?
        .parse::<notify::Event>()?;

    let account_path = matches
        .get_one::<String>(ARG_ACCOUNT)
        .map(PathBuf::from)
        .context("missing required argument: --account")?;

    Ok(Action::Notify(notify::Args {
        event,
        account_path,
        config: config(matches),
    }))
}

fn config(matches: &clap::ArgMatches) -> Config {
    let context = ContextQuery {
        context: matches.get_one::<String>(ARG_CONTEXT).cloned(),
        service: matches.get_one::<String>(ARG_SERVICE).cloned(),
        in_iframe: matches.get_flag(ARG_IFRAME),
    };

    let request_timeout = matches
        .get_one::<u64>(ARG_REQUEST_TIMEOUT_MS)
        .map_or(DEFAULT_REQUEST_TIMEOUT, |ms| Duration::from_millis(*ms));

    Config::default()
        .with_context(context)
        .with_request_timeout(request_timeout)
}
