//! Email-verification polling.
//!
//! The poller repeatedly asks a [`SessionStatus`] collaborator whether the
//! session has been confirmed. Only a bounce is terminal; anything else is
//! reported and the loop starts over after a jittered delay, as far as the
//! [`RestartPolicy`] allows. Every await point races the caller's
//! [`CancellationToken`], so a torn-down view never sees a late navigation.

mod resend;

use crate::{
    account::AccountSnapshot,
    broker::{Broker, FlowResult},
    error::{errno, AuthError, BrokerError},
    report::{self, ErrorReport, Reporter},
};
use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{fmt, future::Future, sync::Arc, time::Duration};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub use resend::{resend, ResendOutcome, SignUpRetry};

/// Event logged once per confirmed session.
pub const VERIFICATION_SUCCESS_EVENT: &str = "confirm.verification.success";

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Asks the auth server about a session's verification state.
#[async_trait]
pub trait SessionStatus: Send + Sync {
    /// One bounded attempt: resolves once the session is verified, or fails.
    /// Implementations own their own timeout; the poller does not add one.
    async fn wait_for_session_verification(
        &self,
        account: &AccountSnapshot,
        interval: Duration,
    ) -> Result<(), AuthError>;
}

/// Local persistence for the account being verified.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Remember enough to resume verification after a reload.
    async fn persist_verification_data(&self, account: &AccountSnapshot) -> anyhow::Result<()>;

    async fn set_account(&self, account: &AccountSnapshot) -> anyhow::Result<()>;
}

/// Which flow is waiting on the confirmation email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationReason {
    SignUp,
    SignIn,
}

impl VerificationReason {
    /// Screen to go back to when there is no session to poll.
    #[must_use]
    pub fn start_route(self) -> &'static str {
        match self {
            Self::SignUp => "signup",
            Self::SignIn => "signin",
        }
    }

    #[must_use]
    pub fn confirmed_screen(self) -> ConfirmedScreen {
        match self {
            Self::SignUp => ConfirmedScreen::SignupConfirmed,
            Self::SignIn => ConfirmedScreen::SigninConfirmed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmedScreen {
    SignupConfirmed,
    SigninConfirmed,
}

impl ConfirmedScreen {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SignupConfirmed => "signup_confirmed",
            Self::SigninConfirmed => "signin_confirmed",
        }
    }
}

impl fmt::Display for ConfirmedScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many times an unexpected polling error may restart the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Keep restarting until success, bounce or cancellation.
    #[default]
    Unbounded,
    /// At most this many restarts, then give up with a generic failure.
    Bounded(u32),
    /// The first unexpected error is final.
    Disabled,
}

impl RestartPolicy {
    fn allows(self, restarts_so_far: u32) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Bounded(max) => restarts_so_far < max,
            Self::Disabled => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollState {
    /// Status checks started, including the one that ended the loop.
    pub attempts: u32,
    pub restarts: u32,
    pub last_error: Option<String>,
    /// The flow reached an end state; false when cancelled or never started.
    pub terminal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The session is verified; `halt` asks the caller to stay put.
    Confirmed { screen: ConfirmedScreen, halt: bool },
    /// The confirmation email bounced. Carries the address for a retry.
    Bounced { email: Option<String> },
    /// Restarts were exhausted; `message` is safe to show the user.
    Failed { message: String },
    /// No session token to poll with; send the user back to `route`.
    MissingSession { route: &'static str },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub outcome: PollOutcome,
    pub state: PollState,
}

pub struct VerificationPoller {
    broker: Arc<Broker>,
    status: Arc<dyn SessionStatus>,
    store: Arc<dyn AccountStore>,
    reporter: Arc<dyn Reporter>,
    reason: VerificationReason,
    poll_interval: Duration,
    restart_policy: RestartPolicy,
}

impl VerificationPoller {
    #[must_use]
    pub fn new(
        broker: Arc<Broker>,
        status: Arc<dyn SessionStatus>,
        store: Arc<dyn AccountStore>,
        reporter: Arc<dyn Reporter>,
        reason: VerificationReason,
    ) -> Self {
        Self {
            broker,
            status,
            store,
            reporter,
            reason,
            poll_interval: DEFAULT_POLL_INTERVAL,
            restart_policy: RestartPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_restart_policy(mut self, restart_policy: RestartPolicy) -> Self {
        self.restart_policy = restart_policy;
        self
    }

    /// Poll until the session is verified or the loop hits a terminal outcome.
    ///
    /// # Errors
    /// Only broker configuration errors. Polling failures end up in the
    /// returned [`PollOutcome`].
    #[instrument(skip_all, fields(reason = ?self.reason))]
    pub async fn poll(
        &self,
        mut account: AccountSnapshot,
        cancel: &CancellationToken,
    ) -> Result<PollReport, BrokerError> {
        let mut state = PollState::default();

        if !account.has_session_token() {
            debug!("no session token, nothing to poll");
            return Ok(finish(
                state,
                PollOutcome::MissingSession {
                    route: self.reason.start_route(),
                },
            ));
        }

        if cancel.is_cancelled() {
            return Ok(finish(state, PollOutcome::Cancelled));
        }

        match or_cancel(cancel, self.store.persist_verification_data(&account)).await {
            None => return Ok(finish(state, PollOutcome::Cancelled)),
            Some(Err(err)) => self.report_store_error("verification.persist", &err),
            Some(Ok(())) => {}
        }

        if self.reason == VerificationReason::SignUp {
            let Some(before) =
                or_cancel(cancel, self.broker.before_sign_up_confirmation_poll(&account)).await
            else {
                return Ok(finish(state, PollOutcome::Cancelled));
            };
            before?;
        }

        let mut rng = StdRng::from_entropy();

        loop {
            state.attempts += 1;

            let attempt = self
                .status
                .wait_for_session_verification(&account, self.poll_interval);
            let Some(result) = or_cancel(cancel, attempt).await else {
                return Ok(finish(state, PollOutcome::Cancelled));
            };

            match result {
                Ok(()) => return self.confirmed(&mut account, state, cancel).await,
                Err(AuthError::SignupEmailBounce) => {
                    warn!("verification email bounced");
                    return Ok(finish(
                        state,
                        PollOutcome::Bounced {
                            email: account.email.clone(),
                        },
                    ));
                }
                Err(err) => {
                    let message = err.to_string();
                    report::submit(
                        self.reporter.as_ref(),
                        &ErrorReport::new("verification.poll", message.clone())
                            .with_errno(errno::POLLING_FAILED),
                    );
                    state.last_error = Some(message);

                    if !self.restart_policy.allows(state.restarts) {
                        warn!(attempts = state.attempts, "giving up on verification polling");
                        return Ok(finish(
                            state,
                            PollOutcome::Failed {
                                message: AuthError::PollingFailed.to_string(),
                            },
                        ));
                    }

                    state.restarts += 1;
                    let delay = self.restart_delay(&mut rng);
                    debug!(restarts = state.restarts, ?delay, "restarting verification poll");

                    if or_cancel(cancel, sleep(delay)).await.is_none() {
                        return Ok(finish(state, PollOutcome::Cancelled));
                    }
                }
            }
        }
    }

    async fn confirmed(
        &self,
        account: &mut AccountSnapshot,
        state: PollState,
        cancel: &CancellationToken,
    ) -> Result<PollReport, BrokerError> {
        let hook = match self.reason {
            VerificationReason::SignUp => {
                or_cancel(cancel, self.broker.after_sign_up_confirmation_poll(account)).await
            }
            VerificationReason::SignIn => {
                or_cancel(cancel, self.broker.after_sign_in_confirmation_poll(account)).await
            }
        };
        let Some(flow) = hook else {
            return Ok(finish(state, PollOutcome::Cancelled));
        };
        let FlowResult { halt } = flow?;

        account.verified = Some(true);
        match or_cancel(cancel, self.store.set_account(account)).await {
            None => return Ok(finish(state, PollOutcome::Cancelled)),
            Some(Err(err)) => self.report_store_error("verification.set_account", &err),
            Some(Ok(())) => {}
        }

        self.reporter.log_event(VERIFICATION_SUCCESS_EVENT);
        info!(attempts = state.attempts, "session verified");

        Ok(finish(
            state,
            PollOutcome::Confirmed {
                screen: self.reason.confirmed_screen(),
                halt,
            },
        ))
    }

    fn restart_delay(&self, rng: &mut StdRng) -> Duration {
        self.poll_interval.mul_f64(rng.gen_range(0.8..1.2))
    }

    fn report_store_error(&self, origin: &'static str, err: &anyhow::Error) {
        report::submit(
            self.reporter.as_ref(),
            &ErrorReport::new(origin, format!("{err:#}")),
        );
    }
}

fn finish(mut state: PollState, outcome: PollOutcome) -> PollReport {
    state.terminal = matches!(
        outcome,
        PollOutcome::Confirmed { .. } | PollOutcome::Bounced { .. } | PollOutcome::Failed { .. }
    );
    PollReport { outcome, state }
}

/// `None` if `cancel` fired first.
async fn or_cancel<F: Future>(cancel: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        output = future => Some(output),
    }
}
