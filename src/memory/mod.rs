//! Conversation memory
//!
//! Sessions and chat messages for every channel conversation, plus the
//! rendering of recent history into the compact context the RAG pipeline
//! consumes.

pub mod in_memory;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

pub use in_memory::InMemoryStore;

use crate::models::ChatMessage;
use crate::models::ConversationSession;
use crate::models::SenderRole;
use crate::models::SessionKey;
use crate::models::TenantMembership;
use crate::Result;

/// Persistent per-channel conversation state
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Find the session for `key` or create it, refreshing `last_active_at`
    async fn open_session(&self, key: &SessionKey) -> Result<ConversationSession>;

    /// Append one immutable message to the session
    async fn append_message(
        &self,
        session: &ConversationSession,
        role: SenderRole,
        content: &str,
    ) -> Result<ChatMessage>;

    /// Latest `limit` messages strictly older than `before_id` (all when `None`),
    /// returned oldest first
    async fn recent_messages(
        &self,
        session: &ConversationSession,
        limit: usize,
        before_id: Option<i64>,
    ) -> Result<Vec<ChatMessage>>;

    /// Delete every session and message owned by `owner_id`.
    ///
    /// Returns the number of rows removed; clearing twice yields `0`.
    async fn clear_memory(&self, owner_id: Uuid) -> Result<u64>;

    /// Last `max_turns` messages rendered as `user: …` / `bot: …` lines
    async fn recent_context(
        &self,
        session: &ConversationSession,
        max_turns: usize,
    ) -> Result<String> {
        if max_turns == 0 {
            return Ok(String::new());
        }
        let messages = self.recent_messages(session, max_turns, None).await?;
        Ok(format_context(&messages))
    }

    /// History visible when answering `message_id`, at most `max_turns` lines
    ///
    /// Everything logged before the message counts, plus bot replies logged
    /// after it (answers to earlier turns that were still in flight). The
    /// message itself and later customer messages waiting for their own reply
    /// are left out.
    async fn reply_context(
        &self,
        session: &ConversationSession,
        message_id: i64,
        max_turns: usize,
    ) -> Result<String> {
        if max_turns == 0 {
            return Ok(String::new());
        }
        let window = max_turns.saturating_mul(2).saturating_add(1);
        let visible: Vec<ChatMessage> = self
            .recent_messages(session, window, None)
            .await?
            .into_iter()
            .filter(|m| m.id < message_id || (m.id > message_id && m.role == SenderRole::Bot))
            .collect();
        let skip = visible.len().saturating_sub(max_turns);
        Ok(format_context(&visible[skip..]))
    }
}

/// Render messages (already oldest first) one per line
#[must_use]
pub fn format_context(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// How an owner's tenant memberships map to the tenants a channel searches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantSelection {
    /// Earliest membership only; ties go to the smallest tenant id
    #[default]
    Primary,
    /// Every tenant the owner belongs to
    All,
}

impl TenantSelection {
    /// Resolve memberships to tenant ids in a deterministic order
    #[must_use]
    pub fn resolve(self, memberships: &[TenantMembership]) -> Vec<Uuid> {
        let mut sorted: Vec<&TenantMembership> = memberships.iter().collect();
        sorted.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.tenant_id.cmp(&b.tenant_id))
        });

        let mut tenants: Vec<Uuid> = Vec::with_capacity(sorted.len());
        for membership in sorted {
            if !tenants.contains(&membership.tenant_id) {
                tenants.push(membership.tenant_id);
            }
        }

        match self {
            Self::Primary => tenants.into_iter().take(1).collect(),
            Self::All => tenants,
        }
    }
}
