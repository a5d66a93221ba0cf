use super::{Channel, ChannelError};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::trace;

/// Same-process transport with nobody on the other end.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullChannel;

#[async_trait]
impl Channel for NullChannel {
    async fn send(&self, command: &str, _data: Option<Value>) -> Result<(), ChannelError> {
        trace!("null channel dropped `{command}`");
        Ok(())
    }

    async fn request(
        &self,
        _command: &str,
        _data: Option<Value>,
        _timeout: Option<Duration>,
    ) -> Result<Value, ChannelError> {
        Err(ChannelError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_channel_accepts_sends_and_refuses_requests() {
        let channel = NullChannel;
        assert!(channel.send("loaded", None).await.is_ok());
        assert!(matches!(
            channel.request("can_link_account", None, None).await,
            Err(ChannelError::Closed)
        ));
    }
}
