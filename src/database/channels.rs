use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use super::Database;
use crate::channels::ChannelDirectory;
use crate::models::ChannelBinding;
use crate::models::ChannelKind;
use crate::models::TenantMembership;
use crate::Result;

#[derive(sqlx::FromRow)]
struct RawFacebookPage {
    page_id: String,
    user_id: Uuid,
    tenant_id: Option<Uuid>,
    access_token: String,
    page_name: Option<String>,
}

impl From<RawFacebookPage> for ChannelBinding {
    fn from(row: RawFacebookPage) -> Self {
        Self {
            channel: ChannelKind::Messenger,
            external_id: row.page_id,
            owner_id: row.user_id,
            tenant_id: row.tenant_id,
            credential: row.access_token,
            webhook_secret: None,
            display_name: row.page_name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RawTelegramBot {
    bot_id: String,
    user_id: Uuid,
    tenant_id: Option<Uuid>,
    bot_token: String,
    webhook_secret: String,
    bot_username: Option<String>,
}

impl From<RawTelegramBot> for ChannelBinding {
    fn from(row: RawTelegramBot) -> Self {
        Self {
            channel: ChannelKind::Telegram,
            external_id: row.bot_id,
            owner_id: row.user_id,
            tenant_id: row.tenant_id,
            credential: row.bot_token,
            webhook_secret: Some(row.webhook_secret),
            display_name: row.bot_username,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RawMembership {
    user_id: Uuid,
    tenant_id: Uuid,
    created_at: DateTime<Utc>,
}

const TELEGRAM_COLUMNS: &str =
    "bot_id, user_id, tenant_id, bot_token, webhook_secret, bot_username";

#[async_trait]
impl ChannelDirectory for Database {
    async fn find_binding(
        &self,
        channel: ChannelKind,
        external_id: &str,
    ) -> Result<Option<ChannelBinding>> {
        let binding = match channel {
            ChannelKind::Messenger => sqlx::query_as::<_, RawFacebookPage>(
                r"
                SELECT page_id, user_id, tenant_id, access_token, page_name
                FROM facebook_pages
                WHERE page_id = $1 AND is_active = TRUE
                ",
            )
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ChannelBinding::from),
            ChannelKind::Telegram => sqlx::query_as::<_, RawTelegramBot>(&format!(
                "SELECT {TELEGRAM_COLUMNS} FROM telegram_bots WHERE bot_id = $1 AND is_active = TRUE"
            ))
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?
            .map(ChannelBinding::from),
        };
        Ok(binding)
    }

    async fn find_telegram_by_secret(&self, secret: &str) -> Result<Option<ChannelBinding>> {
        let binding = sqlx::query_as::<_, RawTelegramBot>(&format!(
            "SELECT {TELEGRAM_COLUMNS} FROM telegram_bots WHERE webhook_secret = $1 AND is_active = TRUE"
        ))
        .bind(secret)
        .fetch_optional(&self.pool)
        .await?
        .map(ChannelBinding::from);
        Ok(binding)
    }

    async fn memberships_for_owner(&self, owner_id: Uuid) -> Result<Vec<TenantMembership>> {
        let rows = sqlx::query_as::<_, RawMembership>(
            r"
            SELECT user_id, tenant_id, created_at
            FROM user_tenants
            WHERE user_id = $1
            ORDER BY created_at, tenant_id
            ",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TenantMembership {
                user_id: row.user_id,
                tenant_id: row.tenant_id,
                created_at: row.created_at,
            })
            .collect())
    }
}
