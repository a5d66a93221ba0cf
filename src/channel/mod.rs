//! Transport contract between the identity provider and its embedding host.
//!
//! A channel offers two operations:
//! - `send` is a fire-and-forget notification. It resolves once the transport
//!   has accepted the message, not once the host has acted on it.
//! - `request` expects exactly one correlated reply, or fails with a timeout or
//!   an explicit error reply.
//!
//! Callers must not rely on ordering between independent `send` calls.

pub mod null;
pub mod stream;

#[cfg(test)]
pub(crate) mod recording;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub use null::NullChannel;
pub use stream::StreamChannel;

#[derive(Debug, Error)]
pub enum ChannelError {
    /// The host never answered.
    #[error("no reply to `{command}` after {after:?}")]
    Timeout { command: String, after: Duration },
    #[error("host rejected `{command}`: {message}")]
    Rejected { command: String, message: String },
    #[error("channel closed")]
    Closed,
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid channel message: {0}")]
    Codec(#[from] serde_json::Error),
}

impl ChannelError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[async_trait]
pub trait Channel: Send + Sync {
    async fn send(&self, command: &str, data: Option<Value>) -> Result<(), ChannelError>;

    /// `timeout` of `None` uses the transport's default.
    async fn request(
        &self,
        command: &str,
        data: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, ChannelError>;
}
