//! Error and event reporting sinks.
//!
//! Components never install hidden listeners: whoever detects an error calls
//! [`capture`] with the sink it was built with, and the [`Disposition`] at the
//! call site decides whether the error is swallowed or handed back.

use std::error::Error;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    /// Where the error was caught, e.g. `broker.before_sign_in`.
    pub origin: &'static str,
    pub errno: Option<u32>,
    pub message: String,
}

impl ErrorReport {
    #[must_use]
    pub fn new(origin: &'static str, message: impl Into<String>) -> Self {
        Self {
            origin,
            errno: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_errno(mut self, errno: u32) -> Self {
        self.errno = Some(errno);
        self
    }
}

/// Metrics and exception sink. Every method defaults to a no-op.
pub trait Reporter: Send + Sync {
    fn log_event(&self, _event: &str) {}

    fn log_error(&self, _report: &ErrorReport) {}

    fn capture_exception(&self, _report: &ErrorReport) {}
}

/// Logs events through `tracing`. Errors are already logged by [`submit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn log_event(&self, event: &str) {
        info!(event, "event");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Report, then continue as if nothing failed.
    Swallow,
    /// Report, then return the error to the caller.
    Propagate,
}

/// Log and report `err`, then swallow or propagate it.
///
/// # Errors
/// Returns `err` unchanged when `disposition` is [`Disposition::Propagate`].
pub fn capture<E>(
    reporter: &dyn Reporter,
    origin: &'static str,
    err: E,
    disposition: Disposition,
) -> Result<(), E>
where
    E: Error,
{
    submit(reporter, &ErrorReport::new(origin, err.to_string()));

    match disposition {
        Disposition::Swallow => Ok(()),
        Disposition::Propagate => Err(err),
    }
}

/// Log a prepared report once and hand it to both sinks.
pub fn submit(reporter: &dyn Reporter, report: &ErrorReport) {
    match report.errno {
        Some(errno) => error!(errno, "{}: {}", report.origin, report.message),
        None => error!("{}: {}", report.origin, report.message),
    }
    reporter.capture_exception(report);
    reporter.log_error(report);
}
