//! Facebook Messenger: Graph API client and webhook payloads

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use tracing::info;

use super::ChannelSender;
use super::InboundEvent;
use crate::config::MessengerConfig;
use crate::errors::Result;
use crate::errors::ShopRagError;
use crate::models::ChannelBinding;
use crate::models::ChannelKind;
use crate::retry::RetryPolicy;

/// Header carrying the HMAC of the raw webhook body
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Typing indicator and read receipt actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderAction {
    TypingOn,
    TypingOff,
    MarkSeen,
}

/// Graph API client for the Send API and page subscriptions
#[derive(Clone)]
pub struct MessengerClient {
    client: Client,
    graph_api_base: String,
    retry: RetryPolicy,
}

impl MessengerClient {
    #[must_use]
    pub fn new(client: Client, config: &MessengerConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            graph_api_base: config.graph_api_base.trim_end_matches('/').to_string(),
            retry,
        }
    }

    /// Send a text reply to a PSID with `messaging_type = RESPONSE`
    pub async fn send_text_message(&self, page_token: &str, psid: &str, text: &str) -> Result<()> {
        let body = json!({
            "recipient": { "id": psid },
            "messaging_type": "RESPONSE",
            "message": { "text": text },
        });
        self.post_messages(page_token, &body).await
    }

    pub async fn sender_action(&self, page_token: &str, psid: &str, action: SenderAction) -> Result<()> {
        let body = json!({
            "recipient": { "id": psid },
            "sender_action": action,
        });
        self.post_messages(page_token, &body).await
    }

    async fn post_messages(&self, page_token: &str, body: &serde_json::Value) -> Result<()> {
        let url = format!("{}/me/messages", self.graph_api_base);
        self.retry
            .send("messenger", || {
                self.client
                    .post(&url)
                    .query(&[("access_token", page_token)])
                    .json(body)
            })
            .await?;
        Ok(())
    }

    /// Subscribe the app to a page's `messages` webhook events
    pub async fn subscribe_app(&self, page_id: &str, page_token: &str) -> Result<()> {
        let url = format!("{}/{page_id}/subscribed_apps", self.graph_api_base);
        let response = self
            .retry
            .send("messenger", || {
                self.client.post(&url).query(&[
                    ("subscribed_fields", "messages,messaging_postbacks"),
                    ("access_token", page_token),
                ])
            })
            .await?;
        check_success(response).await?;
        info!("Subscribed app to page {}", page_id);
        Ok(())
    }

    /// Remove the app's subscription from a page
    pub async fn unsubscribe_app(&self, page_id: &str, page_token: &str) -> Result<()> {
        let url = format!("{}/{page_id}/subscribed_apps", self.graph_api_base);
        let response = self
            .retry
            .send("messenger", || {
                self.client
                    .delete(&url)
                    .query(&[("access_token", page_token)])
            })
            .await?;
        check_success(response).await?;
        info!("Unsubscribed app from page {}", page_id);
        Ok(())
    }
}

/// Graph answers `{"success": true}` for subscription changes
async fn check_success(response: reqwest::Response) -> Result<()> {
    #[derive(Deserialize)]
    struct SuccessResponse {
        #[serde(default)]
        success: bool,
    }

    let body: SuccessResponse = response
        .json()
        .await
        .map_err(|e| ShopRagError::ChannelError(format!("Failed to parse Graph response: {e}")))?;
    if body.success {
        Ok(())
    } else {
        Err(ShopRagError::ChannelError(
            "Graph API did not confirm the subscription change".to_string(),
        ))
    }
}

#[async_trait]
impl ChannelSender for MessengerClient {
    async fn send_text(&self, binding: &ChannelBinding, recipient: &str, text: &str) -> Result<()> {
        self.send_text_message(&binding.credential, recipient, text).await
    }

    async fn typing(&self, binding: &ChannelBinding, recipient: &str) -> Result<()> {
        self.sender_action(&binding.credential, recipient, SenderAction::TypingOn)
            .await
    }
}

/// Query string of the subscription handshake
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Challenge to echo when the handshake is valid
#[must_use]
pub fn verify_subscription(query: &VerifyQuery, expected_token: &str) -> Option<String> {
    if expected_token.is_empty() || query.mode.as_deref() != Some("subscribe") {
        return None;
    }
    let token = query.verify_token.as_deref()?;
    if !super::signature::constant_time_eq(token.as_bytes(), expected_token.as_bytes()) {
        return None;
    }
    query.challenge.clone()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    /// Page id
    pub id: String,
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    pub sender: Party,
    pub recipient: Party,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Party {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
}

/// Text messages of a page webhook delivery, in delivery order
///
/// Non-page objects, echoes of the page's own messages, and messages
/// without text (attachments, stickers, reactions) are skipped.
#[must_use]
pub fn extract_events(payload: &WebhookPayload) -> Vec<InboundEvent> {
    if payload.object != "page" {
        debug!("Ignoring Messenger webhook for object {}", payload.object);
        return Vec::new();
    }

    payload
        .entry
        .iter()
        .flat_map(|entry| {
            entry.messaging.iter().filter_map(move |event| {
                let message = event.message.as_ref()?;
                if message.is_echo {
                    return None;
                }
                let text = message.text.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
                Some(InboundEvent {
                    channel: ChannelKind::Messenger,
                    external_id: entry.id.clone(),
                    sender_id: event.sender.id.clone(),
                    reply_to: event.sender.id.clone(),
                    text: text.to_string(),
                })
            })
        })
        .collect()
}
