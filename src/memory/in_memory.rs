//! Process-local memory store
//!
//! Backs tests and `serve --ephemeral-memory`. Everything is lost on restart.

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::MemoryStore;
use crate::errors::ShopRagError;
use crate::models::ChatMessage;
use crate::models::ConversationSession;
use crate::models::SenderRole;
use crate::models::SessionKey;
use crate::Result;

/// DashMap-backed [`MemoryStore`]
#[derive(Clone, Default)]
pub struct InMemoryStore {
    sessions: Arc<DashMap<SessionKey, ConversationSession>>,
    messages: Arc<DashMap<Uuid, Vec<ChatMessage>>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.iter().map(|entry| entry.value().len()).sum()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn open_session(&self, key: &SessionKey) -> Result<ConversationSession> {
        let mut entry = self
            .sessions
            .entry(key.clone())
            .or_insert_with(|| ConversationSession::new(key));
        entry.last_active_at = Utc::now();
        Ok(entry.clone())
    }

    async fn append_message(
        &self,
        session: &ConversationSession,
        role: SenderRole,
        content: &str,
    ) -> Result<ChatMessage> {
        if !self.sessions.contains_key(&session.key()) {
            return Err(ShopRagError::NotFound(format!("session {}", session.id)));
        }

        // Ids are taken under the session's entry lock so each history stays sorted
        let mut history = self.messages.entry(session.id).or_default();
        let message = ChatMessage {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            session_id: session.id,
            owner_id: session.owner_id,
            tenant_id: session.tenant_id,
            channel: session.channel,
            external_user_id: session.external_user_id.clone(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        history.push(message.clone());
        Ok(message)
    }

    async fn recent_messages(
        &self,
        session: &ConversationSession,
        limit: usize,
        before_id: Option<i64>,
    ) -> Result<Vec<ChatMessage>> {
        let Some(history) = self.messages.get(&session.id) else {
            return Ok(Vec::new());
        };

        let eligible: Vec<&ChatMessage> = history
            .iter()
            .filter(|m| before_id.map_or(true, |id| m.id < id))
            .collect();
        let skip = eligible.len().saturating_sub(limit);
        Ok(eligible.into_iter().skip(skip).cloned().collect())
    }

    async fn clear_memory(&self, owner_id: Uuid) -> Result<u64> {
        let owned: Vec<SessionKey> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().owner_id == owner_id)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0u64;
        for key in owned {
            if let Some((_, session)) = self.sessions.remove(&key) {
                removed += 1;
                if let Some((_, messages)) = self.messages.remove(&session.id) {
                    removed += messages.len() as u64;
                }
            }
        }
        Ok(removed)
    }
}
