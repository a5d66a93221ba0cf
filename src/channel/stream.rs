//! JSON-lines channel over any byte stream pair (stdio, a socket, a pipe).
//!
//! Flow Overview:
//! - Every outgoing message gets a fresh `messageId` (uuid v4).
//! - `request` registers a oneshot sender in the pending map *before* writing,
//!   then waits for the reply or the timeout.
//! - A reader task parses reply lines and hands each one to the sender that
//!   owns its `messageId`. Unknown ids are logged and dropped.
//! - A requester that gives up (timeout, cancellation, dropped future) takes
//!   its pending entry with it.
//! - Lines that are not UTF-8 or not JSON are logged and skipped; only EOF or
//!   an I/O error ends the reader.
//! - When the stream ends every pending request resolves to `Closed`.

use super::{Channel, ChannelError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

type ReplyResult = Result<Value, ChannelError>;
// Never held across an await, so a std mutex is enough and Drop can use it.
type PendingReplies = Arc<StdMutex<HashMap<String, PendingReply>>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct PendingReply {
    command: String,
    reply_tx: oneshot::Sender<ReplyResult>,
}

fn lock(pending: &PendingReplies) -> MutexGuard<'_, HashMap<String, PendingReply>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a request's pending entry however the request ends.
struct PendingGuard<'a> {
    pending: &'a PendingReplies,
    message_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(self.message_id);
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Outgoing<'a> {
    message_id: &'a str,
    command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Incoming {
    message_id: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<IncomingError>,
}

#[derive(Debug, Deserialize)]
struct IncomingError {
    message: String,
}

pub struct StreamChannel {
    writer: Mutex<BoxedWriter>,
    pending: PendingReplies,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    default_timeout: Duration,
}

impl StreamChannel {
    /// Start the reply reader on the current tokio runtime.
    pub fn new<R, W>(reader: R, writer: W, default_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: PendingReplies = Arc::new(StdMutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_replies(
            reader,
            Arc::clone(&pending),
            Arc::clone(&closed),
        ));

        Self {
            writer: Mutex::new(Box::new(writer)),
            pending,
            closed,
            reader,
            default_timeout,
        }
    }

    /// Number of requests still waiting for a reply.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        lock(&self.pending).len()
    }

    async fn write_message(
        &self,
        message_id: &str,
        command: &str,
        data: Option<&Value>,
    ) -> Result<(), ChannelError> {
        let mut line = serde_json::to_vec(&Outgoing {
            message_id,
            command,
            data,
        })?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

impl Drop for StreamChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl Channel for StreamChannel {
    async fn send(&self, command: &str, data: Option<Value>) -> Result<(), ChannelError> {
        let message_id = Uuid::new_v4().to_string();
        debug!("channel send: {command} ({message_id})");
        self.write_message(&message_id, command, data.as_ref()).await
    }

    async fn request(
        &self,
        command: &str,
        data: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, ChannelError> {
        let message_id = Uuid::new_v4().to_string();
        let (reply_tx, reply_rx) = oneshot::channel();

        {
            let mut pending = lock(&self.pending);
            if self.closed.load(Ordering::Acquire) {
                return Err(ChannelError::Closed);
            }
            pending.insert(
                message_id.clone(),
                PendingReply {
                    command: command.to_string(),
                    reply_tx,
                },
            );
        }
        let _guard = PendingGuard {
            pending: &self.pending,
            message_id: &message_id,
        };

        debug!("channel request: {command} ({message_id})");
        self.write_message(&message_id, command, data.as_ref())
            .await?;

        let after = timeout.unwrap_or(self.default_timeout);
        match tokio::time::timeout(after, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ChannelError::Closed),
            Err(_) => Err(ChannelError::Timeout {
                command: command.to_string(),
                after,
            }),
        }
    }
}

async fn read_replies<R>(reader: R, pending: PendingReplies, closed: Arc<AtomicBool>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("channel reader reached end of stream");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!("channel reader failed: {err}");
                break;
            }
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(err) => {
                warn!("dropping channel reply that is not UTF-8: {err}");
                continue;
            }
        };

        if line.is_empty() {
            continue;
        }

        let incoming: Incoming = match serde_json::from_str(line) {
            Ok(incoming) => incoming,
            Err(err) => {
                warn!("dropping malformed channel reply: {err}");
                continue;
            }
        };

        let Some(waiting) = lock(&pending).remove(&incoming.message_id) else {
            warn!(
                "reply for unknown message id {}, dropping",
                incoming.message_id
            );
            continue;
        };

        let result = match incoming.error {
            Some(error) => Err(ChannelError::Rejected {
                command: waiting.command,
                message: error.message,
            }),
            None => Ok(incoming.data.unwrap_or(Value::Null)),
        };

        if waiting.reply_tx.send(result).is_err() {
            debug!("requester for {} went away", incoming.message_id);
        }
    }

    let mut pending = lock(&pending);
    closed.store(true, Ordering::Release);
    for (_, waiting) in pending.drain() {
        let _ = waiting.reply_tx.send(Err(ChannelError::Closed));
    }
}
