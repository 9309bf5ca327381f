//! Telegram Bot API client and webhook updates

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use tracing::info;

use super::ChannelSender;
use super::InboundEvent;
use crate::config::TelegramConfig;
use crate::errors::Result;
use crate::errors::ShopRagError;
use crate::models::ChannelBinding;
use crate::models::ChannelKind;
use crate::retry::RetryPolicy;

/// Header Telegram sets when a webhook was registered with a secret token
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_base: String,
    retry: RetryPolicy,
}

impl TelegramClient {
    #[must_use]
    pub fn new(client: Client, config: &TelegramConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            retry,
        }
    }

    async fn call(&self, token: &str, method: &str, body: serde_json::Value) -> Result<()> {
        let url = format!("{}/bot{token}/{method}", self.api_base);
        let response = self
            .retry
            .send("telegram", || self.client.post(&url).json(&body))
            .await?;

        let parsed: ApiResponse = response.json().await.map_err(|e| {
            ShopRagError::ChannelError(format!("Failed to parse Telegram {method} response: {e}"))
        })?;
        if parsed.ok {
            Ok(())
        } else {
            Err(ShopRagError::ChannelError(format!(
                "Telegram {method} failed: {}",
                parsed.description.unwrap_or_default()
            )))
        }
    }

    pub async fn send_message(&self, token: &str, chat_id: &str, text: &str) -> Result<()> {
        self.call(token, "sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await
    }

    pub async fn send_chat_action(&self, token: &str, chat_id: &str) -> Result<()> {
        self.call(
            token,
            "sendChatAction",
            json!({ "chat_id": chat_id, "action": "typing" }),
        )
        .await
    }

    /// Point the bot's webhook at `url`; Telegram echoes `secret_token` in
    /// [`SECRET_TOKEN_HEADER`] on every delivery
    pub async fn set_webhook(&self, token: &str, url: &str, secret_token: &str) -> Result<()> {
        self.call(
            token,
            "setWebhook",
            json!({
                "url": url,
                "secret_token": secret_token,
                "allowed_updates": ["message"],
            }),
        )
        .await?;
        info!("Telegram webhook set to {}", url);
        Ok(())
    }

    pub async fn delete_webhook(&self, token: &str) -> Result<()> {
        self.call(token, "deleteWebhook", json!({})).await?;
        info!("Telegram webhook deleted");
        Ok(())
    }
}

#[async_trait]
impl ChannelSender for TelegramClient {
    async fn send_text(&self, binding: &ChannelBinding, recipient: &str, text: &str) -> Result<()> {
        self.send_message(&binding.credential, recipient, text).await
    }

    async fn typing(&self, binding: &ChannelBinding, recipient: &str) -> Result<()> {
        self.send_chat_action(&binding.credential, recipient).await
    }
}

/// Public webhook URL for a bot whose secret is `secret`
///
/// # Errors
/// Returns `Url` error when `public_base` is not an absolute URL
pub fn webhook_url(public_base: &str, secret: &str) -> Result<String> {
    let base = url::Url::parse(public_base)?;
    let joined = base.join(&format!("webhooks/telegram/{secret}"))?;
    Ok(joined.to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Normalize an update addressed to `bot_id`
///
/// Only text messages from humans produce an event.
#[must_use]
pub fn extract_event(bot_id: &str, update: &Update) -> Option<InboundEvent> {
    let message = update.message.as_ref()?;
    let text = message.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let Some(text) = text else {
        debug!("Ignoring non-text Telegram update {}", update.update_id);
        return None;
    };

    let sender = match &message.from {
        Some(user) if user.is_bot => return None,
        Some(user) => user.id,
        None => message.chat.id,
    };

    Some(InboundEvent {
        channel: ChannelKind::Telegram,
        external_id: bot_id.to_string(),
        sender_id: sender.to_string(),
        reply_to: message.chat.id.to_string(),
        text: text.to_string(),
    })
}
