#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use relier::{
    account::{AccountRecord, AccountSnapshot},
    broker::{Broker, ContextKind},
    channel::{ChannelError, StreamChannel},
    error::AuthError,
    verification::{
        AccountStore, ConfirmedScreen, PollOutcome, SessionStatus, VerificationReason,
    },
    Config,
};
use serde_json::{json, Value};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    io::{duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::mpsc,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy)]
enum HostMode {
    Approve,
    Ignore,
    Reject,
}

/// Fake host on the far end of a duplex pipe. Every message it reads is
/// forwarded to the returned receiver.
fn spawn_host(
    mode: HostMode,
    request_timeout: Duration,
) -> (Arc<StreamChannel>, mpsc::UnboundedReceiver<Value>, JoinHandle<()>) {
    let (app, host) = duplex(16 * 1024);
    let (app_read, app_write) = split(app);
    let channel = Arc::new(StreamChannel::new(app_read, app_write, request_timeout));

    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        let (host_read, mut host_write) = split(host);
        let mut lines = BufReader::new(host_read).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            let message: Value = serde_json::from_str(&line).expect("invalid message");
            let is_request = message["command"]
                .as_str()
                .is_some_and(|command| command.ends_with("can_link_account"));

            if is_request {
                let reply = match mode {
                    HostMode::Approve => Some(json!({
                        "messageId": message["messageId"],
                        "data": { "ok": true }
                    })),
                    HostMode::Reject => Some(json!({
                        "messageId": message["messageId"],
                        "error": { "message": "host is busy" }
                    })),
                    HostMode::Ignore => None,
                };

                if let Some(reply) = reply {
                    let mut bytes = serde_json::to_vec(&reply).unwrap();
                    bytes.push(b'\n');
                    host_write.write_all(&bytes).await.unwrap();
                }
            }

            if seen_tx.send(message).is_err() {
                break;
            }
        }
    });

    (channel, seen_rx, handle)
}

fn account() -> AccountSnapshot {
    let record: AccountRecord = serde_json::from_value(json!({
        "email": "testuser@testuser.com",
        "uid": "uid",
        "sessionToken": "session_token",
        "keyFetchToken": "key_fetch_token",
        "unwrapBKey": "unwrap_b_key",
        "declinedSyncEngines": ["bookmarks", "passwords"]
    }))
    .unwrap();
    record.into()
}

async fn next(seen: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(Duration::from_secs(5), seen.recv())
        .await
        .expect("host saw nothing")
        .expect("host went away")
}

struct FlakyStatus {
    script: Mutex<VecDeque<Result<(), AuthError>>>,
}

#[async_trait]
impl SessionStatus for FlakyStatus {
    async fn wait_for_session_verification(
        &self,
        _account: &AccountSnapshot,
        _interval: Duration,
    ) -> Result<(), AuthError> {
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or(Ok(()))
    }
}

#[derive(Default)]
struct MemoryStore {
    saved: Mutex<Option<AccountSnapshot>>,
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn persist_verification_data(&self, _account: &AccountSnapshot) -> anyhow::Result<()> {
        Ok(())
    }

    async fn set_account(&self, account: &AccountSnapshot) -> anyhow::Result<()> {
        *self.saved.lock().unwrap() = Some(account.clone());
        Ok(())
    }
}

#[tokio::test]
async fn sign_up_flow_over_a_stream() -> anyhow::Result<()> {
    // 1. Host that approves linking
    let (channel, mut seen, host) = spawn_host(HostMode::Approve, Duration::from_secs(1));
    let config = Config::default()
        .with_context(relier::broker::ContextQuery {
            context: Some("fx_desktop_v2".to_string()),
            ..Default::default()
        })
        .with_poll_interval(Duration::from_millis(1));
    let broker = Arc::new(config.broker().with_channel(channel.clone()));
    assert_eq!(broker.kind(), ContextKind::FxDesktopV2);

    // 2. Page load and link check
    broker.after_loaded().await;
    broker.before_sign_in(&account()).await?;

    let loaded = next(&mut seen).await;
    assert_eq!(loaded["command"], "fxaccounts:loaded");
    assert!(loaded.get("data").is_none());

    let can_link = next(&mut seen).await;
    assert_eq!(can_link["command"], "fxaccounts:can_link_account");
    assert_eq!(can_link["data"], json!({ "email": "testuser@testuser.com" }));

    // 3. Poll through one transport timeout
    let status = Arc::new(FlakyStatus {
        script: Mutex::new(VecDeque::from([Err(AuthError::from(ChannelError::Timeout {
            command: "recovery_email_status".to_string(),
            after: Duration::from_millis(10),
        }))])),
    });
    let store = Arc::new(MemoryStore::default());
    let poller = config.poller(
        Arc::clone(&broker),
        status,
        store.clone(),
        Arc::new(relier::report::TracingReporter),
        VerificationReason::SignUp,
    );

    let report = poller.poll(account(), &CancellationToken::new()).await?;

    assert_eq!(
        report.outcome,
        PollOutcome::Confirmed {
            screen: ConfirmedScreen::SignupConfirmed,
            halt: false
        }
    );
    assert_eq!(report.state.restarts, 1);
    assert_eq!(
        store.saved.lock().unwrap().as_ref().and_then(|a| a.verified),
        Some(true)
    );

    // 4. The host got exactly one login, after the link approval
    let login = next(&mut seen).await;
    assert_eq!(login["command"], "fxaccounts:login");
    assert_eq!(login["data"]["verifiedCanLinkAccount"], true);
    assert_eq!(login["data"]["verified"], false);
    assert_eq!(
        login["data"]["declinedSyncEngines"],
        json!(["bookmarks", "passwords"])
    );
    assert!(login["data"].get("sessionTokenContext").is_none());
    assert!(seen.try_recv().is_err());
    assert_eq!(channel.pending_requests(), 0);

    host.abort();
    Ok(())
}

#[tokio::test]
async fn silent_host_does_not_block_sign_in() -> anyhow::Result<()> {
    let (channel, mut seen, host) = spawn_host(HostMode::Ignore, Duration::from_secs(30));
    let broker = Broker::new(ContextKind::FxDesktopV2)
        .with_channel(channel.clone())
        .with_request_timeout(Duration::from_millis(50));

    broker.before_sign_in(&account()).await?;
    let flow = broker.after_sign_in(&account()).await?;

    assert!(!flow.halt);
    assert_eq!(next(&mut seen).await["command"], "fxaccounts:can_link_account");
    let login = next(&mut seen).await;
    assert_eq!(login["command"], "fxaccounts:login");
    assert_eq!(login["data"]["verifiedCanLinkAccount"], false);
    assert!(!broker.has_link_approval("testuser@testuser.com"));
    assert_eq!(channel.pending_requests(), 0);

    host.abort();
    Ok(())
}

#[tokio::test]
async fn rejecting_host_does_not_block_sign_in() -> anyhow::Result<()> {
    let (channel, mut seen, host) = spawn_host(HostMode::Reject, Duration::from_secs(1));
    let broker = Broker::new(ContextKind::FxFirstrunV1).with_channel(channel);

    broker.before_sign_in(&account()).await?;
    broker.after_sign_in(&account()).await?;

    assert_eq!(next(&mut seen).await["command"], "fxaccounts:can_link_account");
    assert_eq!(next(&mut seen).await["command"], "fxaccounts:login");

    host.abort();
    Ok(())
}
