//! Messaging channel adapters
//!
//! Inbound webhooks from Facebook Messenger and Telegram are normalized into
//! [`InboundEvent`]s, logged to conversation memory, answered by the RAG
//! pipeline and replied to through the channel's send API.

pub mod messenger;
pub mod service;
pub mod signature;
pub mod telegram;

use std::future::Future;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

pub use messenger::MessengerClient;
pub use service::ChannelService;
pub use telegram::TelegramClient;

use crate::errors::Result;
use crate::models::ChannelBinding;
use crate::models::ChannelKind;
use crate::models::TenantMembership;

/// A text message from an end-user, normalized across channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub channel: ChannelKind,
    /// Facebook page id or Telegram bot id the message was sent to
    pub external_id: String,
    /// Stable id of the end-user on the channel
    pub sender_id: String,
    /// Where replies go: the PSID on Messenger, the chat id on Telegram
    pub reply_to: String,
    pub text: String,
}

/// What happened to the reply for one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Reply delivered in `parts` messages
    Sent {
        parts: usize,
        degraded: bool,
        apology: bool,
    },
    /// Sender exceeded its budget; nothing was sent
    RateLimited,
    /// Reply could not be logged or delivered
    Failed(String),
}

/// Result of a fire-and-forget call. Callers never branch on it; it only
/// records whether the side effect happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BestEffort {
    Done,
    Skipped,
}

/// Run `fut` in the background, discarding (but logging) its failure
pub fn best_effort<F>(label: &'static str, fut: F) -> JoinHandle<BestEffort>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match fut.await {
            Ok(()) => BestEffort::Done,
            Err(e) => {
                debug!("{} skipped: {}", label, e);
                BestEffort::Skipped
            }
        }
    })
}

/// Lookup of channel bindings and tenant memberships
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// Active binding for a page id / bot id
    async fn find_binding(
        &self,
        channel: ChannelKind,
        external_id: &str,
    ) -> Result<Option<ChannelBinding>>;

    /// Active Telegram binding whose webhook secret is `secret`
    async fn find_telegram_by_secret(&self, secret: &str) -> Result<Option<ChannelBinding>>;

    /// Every tenant membership of a dashboard user
    async fn memberships_for_owner(&self, owner_id: Uuid) -> Result<Vec<TenantMembership>>;
}

/// Outbound half of a channel
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Deliver one message of at most [`ChannelKind::max_message_chars`] chars
    async fn send_text(&self, binding: &ChannelBinding, recipient: &str, text: &str) -> Result<()>;

    /// Show the typing indicator
    async fn typing(&self, binding: &ChannelBinding, recipient: &str) -> Result<()>;
}

/// Split `text` into chunks of at most `max_chars` characters, preferring to
/// break after a newline or space in the last part of each chunk
#[must_use]
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || max_chars == 0 {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let Some((cut, _)) = rest.char_indices().nth(max_chars) else {
            parts.push(rest.to_string());
            break;
        };

        let window = &rest[..cut];
        let min_break = cut / 2;
        let split_at = window
            .rfind('\n')
            .filter(|&i| i >= min_break)
            .or_else(|| window.rfind(' ').filter(|&i| i >= min_break))
            .map_or(cut, |i| i + 1);

        let part = rest[..split_at].trim_end();
        if !part.is_empty() {
            parts.push(part.to_string());
        }
        rest = rest[split_at..].trim_start();
    }
    parts
}
