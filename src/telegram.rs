//! Minimal Telegram Bot API client.
//!
//! Covers the two calls the relay needs: `sendMessage` for delivery and
//! `getUpdates` long polling for admin commands.  Error answers are mapped to
//! [`SendError`], with HTTP 429 / `parameters.retry_after` becoming
//! [`SendError::RateLimited`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::error::SendError;
use crate::sender::MessageSender;
use crate::target::ChatId;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Extra time allowed on top of the long-poll timeout before reqwest gives up.
const LONG_POLL_MARGIN: Duration = Duration::from_secs(10);

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// Chat and text of a text message, if this update carries one.
    pub fn text_message(&self) -> Option<(ChatId, &str)> {
        let message = self.message.as_ref()?;
        let text = message.text.as_deref()?;
        Some((ChatId(message.chat.id), text))
    }
}

pub struct TelegramClient {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(client: Client, token: impl Into<String>) -> Self {
        Self::with_api_base(client, token, DEFAULT_API_BASE)
    }

    /// Point the client at another Bot API server (a local one, or a test).
    pub fn with_api_base(
        client: Client,
        token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Fetch updates after `offset`, waiting up to `timeout` for one to
    /// arrive.
    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>, SendError> {
        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(timeout + LONG_POLL_MARGIN)
            .json(&json!({
                "offset": offset,
                "timeout": timeout.as_secs(),
                "allowed_updates": ["message"],
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let updates: Option<Vec<Update>> = parse_response(status, &body)?;
        Ok(updates.unwrap_or_default())
    }

    /// Skip every update queued while the bot was offline.
    ///
    /// Returns the offset to continue polling from.
    pub async fn drop_pending_updates(&self) -> Result<i64, SendError> {
        let last = self.get_updates(-1, Duration::ZERO).await?;
        Ok(last.last().map(|u| u.update_id + 1).unwrap_or(0))
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), SendError> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({
                "chat_id": chat.0,
                "text": text,
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        parse_response::<serde_json::Value>(status, &body)?;
        Ok(())
    }
}

/// Decode a Bot API response body, turning error answers into [`SendError`].
fn parse_response<T>(status: StatusCode, body: &str) -> Result<Option<T>, SendError>
where
    T: for<'de> Deserialize<'de>,
{
    let parsed: ApiResponse<T> = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) => {
            return Err(SendError::Api {
                code: status.as_u16(),
                description: truncate(body, 200),
            })
        }
    };

    let retry_after = parsed.parameters.as_ref().and_then(|p| p.retry_after);
    if status == StatusCode::TOO_MANY_REQUESTS || retry_after.is_some() {
        return Err(SendError::RateLimited {
            retry_after: Duration::from_secs(retry_after.unwrap_or(1)),
        });
    }

    if !parsed.ok || !status.is_success() {
        return Err(SendError::Api {
            code: parsed.error_code.unwrap_or(status.as_u16()),
            description: parsed.description.unwrap_or_default(),
        });
    }

    Ok(parsed.result)
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
