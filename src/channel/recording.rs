//! Test double shared by the broker and poller tests.

use super::{Channel, ChannelError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) enum HostReply {
    Value(Value),
    Fail,
}

/// Records every call and answers requests from a fixed script.
pub(crate) struct RecordingChannel {
    sent: Mutex<Vec<(String, Option<Value>)>>,
    requests: Mutex<Vec<(String, Option<Value>)>>,
    reply: HostReply,
    fail_sends: bool,
}

impl RecordingChannel {
    pub(crate) fn replying(reply: HostReply) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            reply,
            fail_sends: false,
        })
    }

    pub(crate) fn failing_sends() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            reply: HostReply::Fail,
            fail_sends: true,
        })
    }

    pub(crate) fn sent(&self) -> Vec<(String, Option<Value>)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn sent_commands(&self) -> Vec<String> {
        self.sent().into_iter().map(|(command, _)| command).collect()
    }

    pub(crate) fn requests(&self) -> Vec<(String, Option<Value>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    async fn send(&self, command: &str, data: Option<Value>) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push((command.to_string(), data));
        if self.fail_sends {
            return Err(ChannelError::Closed);
        }
        Ok(())
    }

    async fn request(
        &self,
        command: &str,
        data: Option<Value>,
        _timeout: Option<Duration>,
    ) -> Result<Value, ChannelError> {
        self.requests
            .lock()
            .unwrap()
            .push((command.to_string(), data));
        match &self.reply {
            HostReply::Value(value) => Ok(value.clone()),
            HostReply::Fail => Err(ChannelError::Rejected {
                command: command.to_string(),
                message: "uh oh".to_string(),
            }),
        }
    }
}
