use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::ShopRagError;

/// External messaging channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Messenger,
    Telegram,
}

impl ChannelKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Messenger => "messenger",
            Self::Telegram => "telegram",
        }
    }

    /// Longest text a single outbound message may carry
    #[must_use]
    pub const fn max_message_chars(self) -> usize {
        match self {
            Self::Messenger => 2000,
            Self::Telegram => 4096,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = ShopRagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "messenger" => Ok(Self::Messenger),
            "telegram" => Ok(Self::Telegram),
            other => Err(ShopRagError::InvalidInput(format!(
                "unknown channel kind: {other}"
            ))),
        }
    }
}

/// Who wrote a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    User,
    Bot,
}

impl SenderRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

impl fmt::Display for SenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SenderRole {
    type Err = ShopRagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "bot" => Ok(Self::Bot),
            other => Err(ShopRagError::InvalidInput(format!(
                "unknown sender role: {other}"
            ))),
        }
    }
}

/// Tenant workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Row of `user_tenants`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Identity of a conversation: one external user on one channel of one tenant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub owner_id: Uuid,
    pub tenant_id: Uuid,
    pub channel: ChannelKind,
    pub external_user_id: String,
}

/// Ongoing exchange with one external end-user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub tenant_id: Uuid,
    pub channel: ChannelKind,
    pub external_user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl ConversationSession {
    #[must_use]
    pub fn new(key: &SessionKey) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: key.owner_id,
            tenant_id: key.tenant_id,
            channel: key.channel,
            external_user_id: key.external_user_id.clone(),
            created_at: now,
            last_active_at: now,
        }
    }

    #[must_use]
    pub fn key(&self) -> SessionKey {
        SessionKey {
            owner_id: self.owner_id,
            tenant_id: self.tenant_id,
            channel: self.channel,
            external_user_id: self.external_user_id.clone(),
        }
    }
}

/// One immutable turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Store-wide monotonic sequence; defines ordering within a session
    pub id: i64,
    pub session_id: Uuid,
    pub owner_id: Uuid,
    pub tenant_id: Uuid,
    pub channel: ChannelKind,
    pub external_user_id: String,
    pub role: SenderRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Catalog record searched by the RAG pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub stock_quantity: Option<i32>,
    pub image_url: Option<String>,
}

impl Product {
    /// Text used when (re)building the product's embedding
    #[must_use]
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![format!("Name: {}", self.name)];
        if let Some(category) = self.category.as_deref().filter(|c| !c.trim().is_empty()) {
            parts.push(format!("Category: {category}"));
        }
        if let Some(description) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            parts.push(format!("Description: {description}"));
        }
        parts.join(". ")
    }
}

/// Product with the score a single search signal gave it
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredProduct {
    pub product: Product,
    pub score: f32,
}

/// Search-optimized rewrite of a user utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedQuery {
    pub original: String,
    pub optimized: String,
}

impl EnhancedQuery {
    /// Query whose optimized form is the original text
    #[must_use]
    pub fn unchanged(original: &str) -> Self {
        Self {
            original: original.to_string(),
            optimized: original.to_string(),
        }
    }

    #[must_use]
    pub fn was_rewritten(&self) -> bool {
        self.original != self.optimized
    }
}

/// Maps an external channel identity to its owner and send credential
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBinding {
    pub channel: ChannelKind,
    /// Facebook page id or Telegram bot id
    pub external_id: String,
    pub owner_id: Uuid,
    /// Pins the binding to one tenant instead of the owner's memberships
    pub tenant_id: Option<Uuid>,
    /// Page access token or bot token
    pub credential: String,
    /// Telegram webhook path segment
    pub webhook_secret: Option<String>,
    pub display_name: Option<String>,
}

impl fmt::Debug for ChannelBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelBinding")
            .field("channel", &self.channel)
            .field("external_id", &self.external_id)
            .field("owner_id", &self.owner_id)
            .field("tenant_id", &self.tenant_id)
            .field("credential", &"<redacted>")
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .field("display_name", &self.display_name)
            .finish()
    }
}
