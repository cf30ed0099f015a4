//! Notification delivery.
//!
//! `NotificationSink` is the seam between the polling loop and the messaging
//! transport. Delivery failures are returned as values; callers decide
//! whether they matter.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use courier_common::error::DeliveryError;
use courier_common::types::Destination;

/// Telegram rejects messages longer than this many characters.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Deliver text to a destination.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, destination: &Destination, text: &str) -> Result<(), DeliveryError>;

    /// Human-readable name for logs (e.g., "telegram").
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<T> {
    async fn send(&self, destination: &Destination, text: &str) -> Result<(), DeliveryError> {
        (**self).send(destination, text).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Cut `text` down to at most `max_chars` characters without splitting one.
pub fn truncate_message(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[derive(Debug, Deserialize)]
struct TelegramReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

/// Sink backed by the Telegram Bot API `sendMessage` method.
#[derive(Clone)]
pub struct TelegramSink {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl TelegramSink {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    /// Call `getMe` and return the bot's username.
    ///
    /// Used once at start-up so a bad bot token fails fast instead of
    /// silently dropping every notification.
    pub async fn verify(&self) -> Result<String, DeliveryError> {
        // The bot token is part of the request path; keep it out of error text.
        let response = self
            .client
            .get(self.method_url("getMe"))
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        let reply = Self::read_reply(response).await?;
        let username = reply
            .result
            .as_ref()
            .and_then(|r| r.get("username"))
            .and_then(|u| u.as_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(username)
    }

    async fn read_reply(response: reqwest::Response) -> Result<TelegramReply, DeliveryError> {
        let status = response.status();
        let reply: TelegramReply = response.json().await.map_err(|e| {
            if status.is_success() {
                DeliveryError::Transport(e.without_url().to_string())
            } else {
                DeliveryError::Rejected(format!("HTTP {}", status.as_u16()))
            }
        })?;

        if !reply.ok {
            return Err(DeliveryError::Rejected(
                reply
                    .description
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            ));
        }

        Ok(reply)
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, destination: &Destination, text: &str) -> Result<(), DeliveryError> {
        let text = truncate_message(text, TELEGRAM_MAX_MESSAGE_LEN);

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&json!({
                "chat_id": destination.as_str(),
                "text": text,
                "disable_web_page_preview": false,
            }))
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        Self::read_reply(response).await?;

        tracing::debug!(destination = %destination, chars = text.chars().count(), "Message delivered");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

impl std::fmt::Debug for TelegramSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSink")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}
