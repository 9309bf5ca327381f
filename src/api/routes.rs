//! API route definitions

use axum::middleware;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;
use axum::Router;

use super::handlers;
use super::handlers::AppState;
use super::webhooks;

/// Operator API, mounted under `/api`
///
/// `/health` stays open; everything else requires the bearer key when one is
/// configured.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/rag/query", post(handlers::rag_query))
        .route("/memory/:owner_id", delete(handlers::clear_memory))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::api_key_middleware,
        ))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Channel webhooks, mounted under `/webhooks`
pub fn webhook_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/messenger",
            get(webhooks::messenger_verify).post(webhooks::messenger_webhook),
        )
        .route("/telegram/:secret", post(webhooks::telegram_webhook))
        .with_state(state)
}

/// Complete application router without transport layers
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes(state.clone()))
        .nest("/webhooks", webhook_routes(state))
}
