//! Admin commands received through the bot.
//!
//! | command      | effect                                             |
//! |--------------|----------------------------------------------------|
//! | `/start`     | make the issuing chat the delivery target          |
//! | `/settarget` | same as `/start`                                   |
//! | `/status`    | report target, interval, last check and seen count |
//! | `/testsend`  | send a test message to the current target          |
//!
//! Commands may carry the `@botname` suffix Telegram adds in groups.  Any
//! other text is ignored.

use std::sync::Arc;
use std::time::Duration;

use crate::app::{Relay, TestSendError};
use crate::sender::MessageSender;
use crate::target::ChatId;
use crate::task::TaskHandle;
use crate::telegram::TelegramClient;

/// How long one `getUpdates` call waits for new messages.
const LONG_POLL: Duration = Duration::from_secs(30);

/// Pause after a failed `getUpdates` call.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    SetTarget,
    Status,
    TestSend,
}

impl Command {
    /// Parse the first word of a message as a command.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "settarget" => Some(Command::SetTarget),
            "status" => Some(Command::Status),
            "testsend" => Some(Command::TestSend),
            _ => None,
        }
    }
}

/// Execute `command` issued from `chat` and return the reply text.
pub async fn handle(relay: &Relay, chat: ChatId, command: Command) -> String {
    match command {
        Command::Start => match relay.set_target(chat) {
            Ok(()) => format!("Bot running. Target set: {chat}"),
            Err(_) => format!("Bot running. Target set: {chat} (not saved to disk)"),
        },
        Command::SetTarget => match relay.set_target(chat) {
            Ok(()) => format!("Target set: {chat}"),
            Err(_) => format!("Target set: {chat} (not saved to disk)"),
        },
        Command::Status => relay.status().to_string(),
        Command::TestSend => match relay.test_send().await {
            Ok(target) => format!("Test message sent to {target}"),
            Err(TestSendError::NoTarget) => "No target set. Use /settarget first.".to_string(),
            Err(TestSendError::Send(e)) => {
                tracing::warn!(error = %e, "test send failed");
                format!("Test send failed: {e}")
            }
        },
    }
}

/// Spawn the long-polling command loop.
pub fn spawn(client: Arc<TelegramClient>, relay: Arc<Relay>) -> TaskHandle {
    TaskHandle::spawn(move |mut shutdown| async move {
        let mut offset = match client.drop_pending_updates().await {
            Ok(offset) => offset,
            Err(e) => {
                tracing::warn!(error = %e, "could not drop pending updates");
                0
            }
        };
        tracing::info!("command poller started");

        loop {
            let updates = tokio::select! {
                result = client.get_updates(offset, LONG_POLL) => result,
                _ = shutdown.recv() => break,
            };

            let updates = match updates {
                Ok(updates) => updates,
                Err(e) => {
                    let wait = e.retry_after().unwrap_or(ERROR_BACKOFF);
                    tracing::warn!(error = %e, wait_secs = wait.as_secs(), "getUpdates failed");
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => continue,
                        _ = shutdown.recv() => break,
                    }
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some((chat, text)) = update.text_message() else {
                    continue;
                };
                let Some(command) = Command::parse(text) else {
                    continue;
                };
                tracing::info!(chat = %chat, ?command, "command received");

                let reply = handle(&relay, chat, command).await;
                if let Err(e) = client.send_message(chat, &reply).await {
                    tracing::warn!(chat = %chat, error = %e, "could not send reply");
                }
            }
        }

        tracing::info!("command poller stopped");
    })
}
