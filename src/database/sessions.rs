use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use super::Database;
use crate::memory::MemoryStore;
use crate::models::ChannelKind;
use crate::models::ChatMessage;
use crate::models::ConversationSession;
use crate::models::SenderRole;
use crate::models::SessionKey;
use crate::Result;
use crate::ShopRagError;

#[derive(sqlx::FromRow)]
struct RawSession {
    id: Uuid,
    owner_id: Uuid,
    tenant_id: Uuid,
    channel: String,
    external_user_id: String,
    created_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
}

impl TryFrom<RawSession> for ConversationSession {
    type Error = ShopRagError;

    fn try_from(row: RawSession) -> Result<Self> {
        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            tenant_id: row.tenant_id,
            channel: row.channel.parse::<ChannelKind>()?,
            external_user_id: row.external_user_id,
            created_at: row.created_at,
            last_active_at: row.last_active_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RawChatMessage {
    id: i64,
    session_id: Uuid,
    owner_id: Uuid,
    tenant_id: Uuid,
    channel: String,
    external_user_id: String,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<RawChatMessage> for ChatMessage {
    type Error = ShopRagError;

    fn try_from(row: RawChatMessage) -> Result<Self> {
        Ok(Self {
            id: row.id,
            session_id: row.session_id,
            owner_id: row.owner_id,
            tenant_id: row.tenant_id,
            channel: row.channel.parse::<ChannelKind>()?,
            external_user_id: row.external_user_id,
            role: row.role.parse::<SenderRole>()?,
            content: row.content,
            created_at: row.created_at,
        })
    }
}

const MESSAGE_COLUMNS: &str =
    "id, session_id, owner_id, tenant_id, channel, external_user_id, role, content, created_at";

#[async_trait]
impl MemoryStore for Database {
    async fn open_session(&self, key: &SessionKey) -> Result<ConversationSession> {
        let row = sqlx::query_as::<_, RawSession>(
            r"
            INSERT INTO bot_sessions (id, owner_id, tenant_id, channel, external_user_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (owner_id, tenant_id, channel, external_user_id)
            DO UPDATE SET last_active_at = NOW()
            RETURNING id, owner_id, tenant_id, channel, external_user_id, created_at, last_active_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(key.owner_id)
        .bind(key.tenant_id)
        .bind(key.channel.as_str())
        .bind(&key.external_user_id)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn append_message(
        &self,
        session: &ConversationSession,
        role: SenderRole,
        content: &str,
    ) -> Result<ChatMessage> {
        let row = sqlx::query_as::<_, RawChatMessage>(&format!(
            r"
            INSERT INTO bot_chat_messages
                (session_id, owner_id, tenant_id, channel, external_user_id, role, content)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {MESSAGE_COLUMNS}
            "
        ))
        .bind(session.id)
        .bind(session.owner_id)
        .bind(session.tenant_id)
        .bind(session.channel.as_str())
        .bind(&session.external_user_id)
        .bind(role.as_str())
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                ShopRagError::NotFound(format!("session {}", session.id))
            }
            other => ShopRagError::Database(other),
        })?;

        row.try_into()
    }

    async fn recent_messages(
        &self,
        session: &ConversationSession,
        limit: usize,
        before_id: Option<i64>,
    ) -> Result<Vec<ChatMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, RawChatMessage>(&format!(
            r"
            SELECT {MESSAGE_COLUMNS}
            FROM bot_chat_messages
            WHERE session_id = $1
              AND ($2::bigint IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "
        ))
        .bind(session.id)
        .bind(before_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut messages = rows
            .into_iter()
            .map(ChatMessage::try_from)
            .collect::<Result<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn clear_memory(&self, owner_id: Uuid) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let messages = sqlx::query("DELETE FROM bot_chat_messages WHERE owner_id = $1")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let sessions = sqlx::query("DELETE FROM bot_sessions WHERE owner_id = $1")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        tracing::info!(
            "Cleared memory for owner {}: {} sessions, {} messages",
            owner_id,
            sessions,
            messages
        );
        Ok(sessions + messages)
    }
}
