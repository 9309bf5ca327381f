//! API request and response types

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::rag::RagAnswer;

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// RAG query request
#[derive(Debug, Deserialize)]
pub struct RagQueryRequest {
    pub tenant_ids: Vec<Uuid>,
    pub question: String,
    /// Prior conversation as `user: …` / `bot: …` lines
    #[serde(default)]
    pub context: Option<String>,
}

/// RAG query response
#[derive(Debug, Serialize, Deserialize)]
pub struct RagQueryResponse {
    pub reply: String,
    pub original_query: String,
    pub optimized_query: String,
    pub degraded: bool,
    pub failed: bool,
}

impl From<RagAnswer> for RagQueryResponse {
    fn from(answer: RagAnswer) -> Self {
        Self {
            reply: answer.reply,
            original_query: answer.query.original,
            optimized_query: answer.query.optimized,
            degraded: answer.degraded,
            failed: answer.failed,
        }
    }
}

/// Memory clear response
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearMemoryResponse {
    pub owner_id: Uuid,
    pub deleted: u64,
}
