use crate::{
    account::{AccountRecord, AccountSnapshot},
    broker::{Broker, FlowResult},
    channel::StreamChannel,
    Config,
};
use anyhow::{Context, Result};
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Loaded,
    SignIn,
    SignOut,
    ChangePassword,
    DeleteAccount,
}

impl Event {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::SignIn => "sign-in",
            Self::SignOut => "sign-out",
            Self::ChangePassword => "change-password",
            Self::DeleteAccount => "delete-account",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Event {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "loaded" => Ok(Self::Loaded),
            "sign-in" => Ok(Self::SignIn),
            "sign-out" => Ok(Self::SignOut),
            "change-password" => Ok(Self::ChangePassword),
            "delete-account" => Ok(Self::DeleteAccount),
            _ => Err(anyhow::anyhow!("unknown event: {name}")),
        }
    }
}

#[derive(Debug)]
pub struct Args {
    pub event: Event,
    pub account_path: PathBuf,
    pub config: Config,
}

/// Relay one lifecycle event to the host on stdin/stdout.
/// # Errors
/// Returns an error if the account file cannot be read, the broker is
/// misconfigured, or the host declines the sign-in.
pub async fn execute(args: Args) -> Result<()> {
    let account = load_account(&args.account_path).await?;

    let channel = StreamChannel::new(
        tokio::io::stdin(),
        tokio::io::stdout(),
        args.config.request_timeout,
    );
    let broker = args.config.broker().with_channel(Arc::new(channel));

    debug!(context = %broker.kind(), event = %args.event, "relaying event");

    let flow = relay(&broker, args.event, &account).await?;

    info!(event = %args.event, halt = flow.halt, "event relayed");

    Ok(())
}

/// Run the broker operations for `event`.
/// # Errors
/// Returns an error on broker misconfiguration or a declined sign-in.
pub async fn relay(broker: &Broker, event: Event, account: &AccountSnapshot) -> Result<FlowResult> {
    let flow = match event {
        Event::Loaded => {
            broker.after_loaded().await;
            FlowResult::default()
        }
        Event::SignIn => {
            broker.before_sign_in(account).await?;
            broker.after_sign_in(account).await?
        }
        Event::SignOut => broker.after_sign_out(account).await?,
        Event::ChangePassword => broker.after_change_password(account).await?,
        Event::DeleteAccount => broker.after_delete_account(account).await?,
    };

    Ok(flow)
}

/// Read an account JSON file (camelCase fields).
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub async fn load_account(path: &Path) -> Result<AccountSnapshot> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read account file {}", path.display()))?;

    let record: AccountRecord = serde_json::from_str(&raw)
        .with_context(|| format!("invalid account file {}", path.display()))?;

    Ok(record.into())
}
