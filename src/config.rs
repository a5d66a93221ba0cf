use crate::{
    broker::{Broker, ContextKind, ContextQuery},
    report::Reporter,
    verification::{
        AccountStore, RestartPolicy, SessionStatus, VerificationPoller, VerificationReason,
        DEFAULT_POLL_INTERVAL,
    },
};
use std::{sync::Arc, time::Duration};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Runtime settings shared by the broker and the verification poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub context: ContextQuery,
    /// Applied to every `request` the broker makes.
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub restart_policy: RestartPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            context: ContextQuery::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            restart_policy: RestartPolicy::default(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn with_context(mut self, context: ContextQuery) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
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

    #[must_use]
    pub fn context_kind(&self) -> ContextKind {
        ContextKind::resolve(&self.context)
    }

    /// A broker for the resolved context. The caller still has to supply a
    /// channel or a channel factory.
    #[must_use]
    pub fn broker(&self) -> Broker {
        Broker::new(self.context_kind()).with_request_timeout(self.request_timeout)
    }

    /// A verification poller using this config's interval and restart policy.
    #[must_use]
    pub fn poller(
        &self,
        broker: Arc<Broker>,
        status: Arc<dyn SessionStatus>,
        store: Arc<dyn AccountStore>,
        reporter: Arc<dyn Reporter>,
        reason: VerificationReason,
    ) -> VerificationPoller {
        VerificationPoller::new(broker, status, store, reporter, reason)
            .with_poll_interval(self.poll_interval)
            .with_restart_policy(self.restart_policy)
    }
}
