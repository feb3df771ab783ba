//! Seam between the dispatcher and the chat gateway.

use async_trait::async_trait;

use crate::error::ReplyError;

/// Where replies to a message are sent, typically the channel it came from.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), ReplyError>;
}
