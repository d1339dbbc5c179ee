//! The narrow capability the core needs from a messaging platform.

use async_trait::async_trait;

use crate::error::SendError;
use crate::target::ChatId;

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Deliver `text` to `chat` as a plain text message.
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), SendError>;
}
