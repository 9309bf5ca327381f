//! Operator API handlers

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Path;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use tracing::info;
use uuid::Uuid;

use super::error::ApiError;
use super::types::ApiResponse;
use super::types::ClearMemoryResponse;
use super::types::HealthResponse;
use super::types::RagQueryRequest;
use super::types::RagQueryResponse;
use crate::channels::signature::constant_time_eq;
use crate::channels::ChannelService;
use crate::config::AppConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub channels: ChannelService,
}

impl AppState {
    #[must_use]
    pub fn new(config: Arc<AppConfig>, channels: ChannelService) -> Self {
        Self { config, channels }
    }
}

/// Bearer token check for `/api/*`; open when no key is configured
pub async fn api_key_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.server.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));
    match provided {
        Some(token) if constant_time_eq(token.trim().as_bytes(), expected.as_bytes()) => {
            Ok(next.run(request).await)
        }
        _ => Err(ApiError::Unauthorized),
    }
}

/// Health check handler
pub async fn health() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Run the RAG pipeline for explicit tenant ids
pub async fn rag_query(
    State(state): State<AppState>,
    Json(request): Json<RagQueryRequest>,
) -> Result<Json<ApiResponse<RagQueryResponse>>, ApiError> {
    info!("POST /api/rag/query: {}", request.question);

    if request.tenant_ids.is_empty() {
        return Err(ApiError::Validation("tenant_ids must not be empty".to_string()));
    }
    if request.question.trim().is_empty() {
        return Err(ApiError::Validation("question must not be empty".to_string()));
    }

    let mut tenants: Vec<String> = request.tenant_ids.iter().map(Uuid::to_string).collect();
    tenants.sort();
    if !state.channels.limiter().check(&format!("api:{}", tenants.join(","))) {
        return Err(ApiError::RateLimited);
    }

    let context = request
        .context
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let answer = state
        .channels
        .rag()
        .answer(&request.tenant_ids, &request.question, context)
        .await;

    Ok(Json(ApiResponse::success(answer.into())))
}

/// Delete every conversation of a dashboard user
pub async fn clear_memory(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ClearMemoryResponse>>, ApiError> {
    info!("DELETE /api/memory/{}", owner_id);

    let deleted = state.channels.memory().clear_memory(owner_id).await?;
    Ok(Json(ApiResponse::success(ClearMemoryResponse { owner_id, deleted })))
}
