//! Relier broker: turns account lifecycle events into channel messages.
//!
//! One `Broker` type serves every integration context. The context picks a
//! profile (command table, default capabilities, behavior hooks) at
//! construction; after that, flow only branches on capabilities and hooks.
//!
//! Failure policy:
//! - configuration errors (no command table, unmapped command, no channel
//!   factory) are returned to the caller, except from `after_loaded`;
//! - transport failures on notifications are reported and swallowed;
//! - a broken `CAN_LINK_ACCOUNT` round trip is reported and sign-in proceeds;
//! - an explicit "no" from the host is `BrokerError::UserCanceledLogin`.

pub mod capabilities;
pub mod commands;
pub mod context;


use crate::{
    account::{normalize_email, AccountSnapshot, IdentityPayload, LoginPayload},
    channel::Channel,
    error::{BrokerError, ConfigError},
    report::{self, Disposition, Reporter, TracingReporter},
};
use serde::Serialize;
use serde_json::{json, Value};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

pub use capabilities::{open_webmail_visible, Capabilities, Capability};
pub use commands::{Command, CommandTable};
pub use context::{ContextKind, ContextQuery, Hooks, Profile};

pub type ChannelFactory =
    Box<dyn Fn() -> Result<Arc<dyn Channel>, ConfigError> + Send + Sync>;

/// Result of a lifecycle operation. `halt` asks the caller to stay on the
/// current screen because the host takes over from here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowResult {
    pub halt: bool,
}

impl FlowResult {
    const CONTINUE: Self = Self { halt: false };

    fn halt_if(halt: bool) -> Self {
        Self { halt }
    }
}

pub struct Broker {
    kind: ContextKind,
    commands: Option<CommandTable>,
    capabilities: Capabilities,
    hooks: Hooks,
    channel: OnceCell<Arc<dyn Channel>>,
    channel_factory: Option<ChannelFactory>,
    reporter: Arc<dyn Reporter>,
    request_timeout: Option<Duration>,
    // Normalized emails the host already agreed to link.
    link_approvals: Mutex<HashSet<String>>,
    loaded: AtomicBool,
}

impl Broker {
    #[must_use]
    pub fn new(kind: ContextKind) -> Self {
        let Profile {
            commands,
            capabilities,
            hooks,
        } = kind.profile();

        Self {
            kind,
            commands,
            capabilities,
            hooks,
            channel: OnceCell::new(),
            channel_factory: None,
            reporter: Arc::new(TracingReporter),
            request_timeout: None,
            link_approvals: Mutex::new(HashSet::new()),
            loaded: AtomicBool::new(false),
        }
    }

    /// Replace the context's command table; `None` removes it.
    #[must_use]
    pub fn with_commands(mut self, commands: Option<CommandTable>) -> Self {
        self.commands = commands;
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Use an already constructed channel instead of creating one lazily.
    #[must_use]
    pub fn with_channel(mut self, channel: Arc<dyn Channel>) -> Self {
        self.channel = OnceCell::new_with(Some(channel));
        self
    }

    #[must_use]
    pub fn with_channel_factory(mut self, factory: ChannelFactory) -> Self {
        self.channel_factory = Some(factory);
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    #[must_use]
    pub fn hooks(&self) -> Hooks {
        self.hooks
    }

    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    #[must_use]
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.has(capability)
    }

    pub fn set_capability(&mut self, capability: Capability, enabled: bool) {
        self.capabilities.set(capability, enabled);
    }

    /// Wire string for a logical command.
    ///
    /// # Errors
    /// Fails if there is no command table or the command is not in it.
    pub fn command(&self, command: Command) -> Result<&str, ConfigError> {
        let table = self
            .commands
            .as_ref()
            .ok_or(ConfigError::MissingCommandTable)?;
        table
            .get(command)
            .ok_or_else(|| ConfigError::CommandNotFound(command.as_str().to_string()))
    }

    /// Wire string for a logical command given by name, e.g. `"LOGIN"`.
    ///
    /// # Errors
    /// Fails if there is no command table or the name is not in it.
    pub fn resolve_command(&self, name: &str) -> Result<&str, ConfigError> {
        self.commands
            .as_ref()
            .ok_or(ConfigError::MissingCommandTable)?
            .resolve(name)
    }

    /// Build a new transport for this broker.
    ///
    /// # Errors
    /// Fails when the broker was built without a channel factory.
    pub fn create_channel(&self) -> Result<Arc<dyn Channel>, ConfigError> {
        match &self.channel_factory {
            Some(factory) => factory(),
            None => Err(ConfigError::CreateChannelNotOverridden),
        }
    }

    /// The broker's channel, created on first use and cached afterwards.
    ///
    /// # Errors
    /// Fails if the channel has to be created and cannot be.
    pub async fn channel(&self) -> Result<Arc<dyn Channel>, ConfigError> {
        self.channel
            .get_or_try_init(|| async { self.create_channel() })
            .await
            .map(Arc::clone)
    }

    /// Whether the host already approved linking `email` during this broker's lifetime.
    #[must_use]
    pub fn has_link_approval(&self, email: &str) -> bool {
        self.link_approvals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&normalize_email(email))
    }

    fn record_link_approval(&self, email: &str) {
        self.link_approvals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize_email(email));
    }

    /// Tell the host the UI is interactive. Only the first call sends; never fails.
    #[instrument(skip(self), fields(context = %self.kind))]
    pub async fn after_loaded(&self) {
        if !self.hooks.relay {
            return;
        }

        if self.loaded.swap(true, Ordering::AcqRel) {
            debug!("loaded already sent");
            return;
        }

        if let Err(err) = self.notify("broker.after_loaded", Command::Loaded, None).await {
            let _ = report::capture(
                self.reporter.as_ref(),
                "broker.after_loaded",
                err,
                Disposition::Swallow,
            );
        }
    }

    /// Ask the host whether this account may be linked, once per email.
    ///
    /// # Errors
    /// `UserCanceledLogin` when the host answers anything but `{ ok: true }`;
    /// `Config` when the broker cannot reach a channel.
    #[instrument(skip_all, fields(context = %self.kind))]
    pub async fn before_sign_in(&self, account: &AccountSnapshot) -> Result<(), BrokerError> {
        if !(self.hooks.relay && self.hooks.verify_can_link) {
            return Ok(());
        }

        let Some(email) = account.email.as_deref() else {
            debug!("no email on account, skipping link check");
            return Ok(());
        };

        if self.has_link_approval(email) {
            debug!("link already approved for this email");
            return Ok(());
        }

        let command = self.command(Command::CanLinkAccount)?;
        let channel = self.channel().await?;

        match channel
            .request(command, Some(json!({ "email": email })), self.request_timeout)
            .await
        {
            Ok(reply) if reply.get("ok").and_then(Value::as_bool) == Some(true) => {
                self.record_link_approval(email);
                Ok(())
            }
            Ok(_) => Err(BrokerError::UserCanceledLogin),
            Err(err) => {
                // A host that cannot answer must not block sign-in.
                let _ = report::capture(
                    self.reporter.as_ref(),
                    "broker.before_sign_in",
                    err,
                    Disposition::Swallow,
                );
                Ok(())
            }
        }
    }

    /// Send `LOGIN` built from the account. Does nothing if a required field is missing.
    ///
    /// # Errors
    /// Only configuration errors.
    #[instrument(skip_all, fields(context = %self.kind))]
    pub async fn notify_relier_of_login(
        &self,
        account: &AccountSnapshot,
    ) -> Result<(), BrokerError> {
        if !self.hooks.relay {
            return Ok(());
        }

        let verified_can_link = account
            .email
            .as_deref()
            .is_some_and(|email| self.has_link_approval(email));

        let Some(payload) = LoginPayload::from_account(account, verified_can_link) else {
            debug!(
                missing = ?account.missing_login_fields(),
                "account incomplete, not sending login"
            );
            return Ok(());
        };

        if let Some(data) = self.encode("broker.notify_relier_of_login", &payload) {
            self.notify("broker.notify_relier_of_login", Command::Login, Some(data))
                .await?;
        }
        Ok(())
    }

    /// # Errors
    /// Only configuration errors.
    pub async fn after_sign_in(&self, account: &AccountSnapshot) -> Result<FlowResult, BrokerError> {
        self.notify_relier_of_login(account).await?;
        Ok(self.relay_result(self.hooks.halt_after_sign_in))
    }

    /// # Errors
    /// Only configuration errors.
    #[instrument(skip_all, fields(context = %self.kind))]
    pub async fn after_sign_out(&self, account: &AccountSnapshot) -> Result<FlowResult, BrokerError> {
        self.notify_identity("broker.after_sign_out", Command::Logout, account)
            .await?;
        Ok(FlowResult::CONTINUE)
    }

    /// Send `CHANGE_PASSWORD` with the refreshed login fields.
    ///
    /// # Errors
    /// Only configuration errors.
    #[instrument(skip_all, fields(context = %self.kind))]
    pub async fn after_change_password(
        &self,
        account: &AccountSnapshot,
    ) -> Result<FlowResult, BrokerError> {
        if !self.hooks.relay {
            return Ok(FlowResult::CONTINUE);
        }

        let verified_can_link = account
            .email
            .as_deref()
            .is_some_and(|email| self.has_link_approval(email));

        match LoginPayload::from_account(account, verified_can_link) {
            Some(payload) => {
                if let Some(data) = self.encode("broker.after_change_password", &payload) {
                    self.notify(
                        "broker.after_change_password",
                        Command::ChangePassword,
                        Some(data),
                    )
                    .await?;
                }
            }
            None => debug!(
                missing = ?account.missing_login_fields(),
                "account incomplete, not sending change_password"
            ),
        }

        Ok(FlowResult::CONTINUE)
    }

    /// # Errors
    /// Only configuration errors.
    #[instrument(skip_all, fields(context = %self.kind))]
    pub async fn after_delete_account(
        &self,
        account: &AccountSnapshot,
    ) -> Result<FlowResult, BrokerError> {
        self.notify_identity("broker.after_delete_account", Command::DeleteAccount, account)
            .await?;
        Ok(FlowResult::CONTINUE)
    }

    /// # Errors
    /// Only configuration errors.
    pub async fn before_sign_up_confirmation_poll(
        &self,
        account: &AccountSnapshot,
    ) -> Result<FlowResult, BrokerError> {
        self.notify_relier_of_login(account).await?;
        Ok(FlowResult::CONTINUE)
    }

    /// # Errors
    /// Never fails today; kept fallible like the other lifecycle hooks.
    pub async fn after_sign_up_confirmation_poll(
        &self,
        _account: &AccountSnapshot,
    ) -> Result<FlowResult, BrokerError> {
        Ok(self.relay_result(self.hooks.halt_after_sign_up_poll))
    }

    /// # Errors
    /// Never fails today; kept fallible like the other lifecycle hooks.
    pub async fn after_sign_in_confirmation_poll(
        &self,
        _account: &AccountSnapshot,
    ) -> Result<FlowResult, BrokerError> {
        Ok(FlowResult::CONTINUE)
    }

    /// # Errors
    /// Only configuration errors.
    pub async fn after_reset_password_confirmation_poll(
        &self,
        account: &AccountSnapshot,
    ) -> Result<FlowResult, BrokerError> {
        self.notify_relier_of_login(account).await?;
        Ok(FlowResult::CONTINUE)
    }

    fn relay_result(&self, halt: bool) -> FlowResult {
        FlowResult::halt_if(self.hooks.relay && halt)
    }

    async fn notify_identity(
        &self,
        origin: &'static str,
        command: Command,
        account: &AccountSnapshot,
    ) -> Result<(), ConfigError> {
        if !self.hooks.relay {
            return Ok(());
        }

        let Some(payload) = IdentityPayload::from_account(account) else {
            debug!("account has no email or uid, not sending {command}");
            return Ok(());
        };

        match self.encode(origin, &payload) {
            Some(data) => self.notify(origin, command, Some(data)).await,
            None => Ok(()),
        }
    }

    /// Serialize a payload. Encoding failures are reported and the message is dropped.
    fn encode<T: Serialize>(&self, origin: &'static str, payload: &T) -> Option<Value> {
        match serde_json::to_value(payload) {
            Ok(value) => Some(value),
            Err(err) => {
                let _ = report::capture(self.reporter.as_ref(), origin, err, Disposition::Swallow);
                None
            }
        }
    }

    /// Fire-and-forget send. Transport failures are reported and swallowed.
    async fn notify(
        &self,
        origin: &'static str,
        command: Command,
        data: Option<Value>,
    ) -> Result<(), ConfigError> {
        let wire = self.command(command)?;
        let channel = self.channel().await?;

        if let Err(err) = channel.send(wire, data).await {
            let _ = report::capture(self.reporter.as_ref(), origin, err, Disposition::Swallow);
        }

        Ok(())
    }
}
