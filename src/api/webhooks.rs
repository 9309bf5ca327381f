//! Inbound channel webhooks
//!
//! Authenticated, well-formed deliveries are acknowledged with `200` once the
//! customer message is logged; replies are produced in the background.

use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use tracing::debug;
use tracing::error;
use tracing::warn;

use super::handlers::AppState;
use crate::channels::messenger;
use crate::channels::messenger::VerifyQuery;
use crate::channels::messenger::WebhookPayload;
use crate::channels::signature::constant_time_eq;
use crate::channels::signature::verify_hub_signature;
use crate::channels::telegram;
use crate::channels::telegram::Update;
use crate::channels::InboundEvent;
use crate::models::ChannelBinding;

/// `GET /webhooks/messenger`: subscription handshake
pub async fn messenger_verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    match messenger::verify_subscription(&query, &state.config.messenger.verify_token) {
        Some(challenge) => (StatusCode::OK, challenge).into_response(),
        None => {
            warn!("Messenger webhook verification rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// `POST /webhooks/messenger`
pub async fn messenger_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let app_secret = state.config.messenger.app_secret.as_str();
    if app_secret.is_empty() {
        error!("messenger.app_secret is not configured, rejecting webhook");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let signature = headers
        .get(messenger::SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());
    if let Err(e) = verify_hub_signature(app_secret, &body, signature) {
        warn!("Rejected Messenger webhook: {}", e);
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Malformed Messenger webhook: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    for event in messenger::extract_events(&payload) {
        accept(&state, None, event).await;
    }

    (StatusCode::OK, "EVENT_RECEIVED").into_response()
}

/// `POST /webhooks/telegram/:secret`
pub async fn telegram_webhook(
    State(state): State<AppState>,
    Path(secret): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let binding = match state.channels.directory().find_telegram_by_secret(&secret).await {
        Ok(Some(binding)) => binding,
        Ok(None) => {
            warn!("Telegram webhook with unknown secret");
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Err(e) => {
            error!("Failed to resolve Telegram bot: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Some(header) = headers.get(telegram::SECRET_TOKEN_HEADER) {
        let matches = header
            .to_str()
            .map(|h| constant_time_eq(h.as_bytes(), secret.as_bytes()))
            .unwrap_or(false);
        if !matches {
            warn!("Telegram secret token header mismatch for bot {}", binding.external_id);
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Malformed Telegram update: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match telegram::extract_event(&binding.external_id, &update) {
        Some(event) => accept(&state, Some(binding), event).await,
        None => debug!("Ignoring Telegram update {}", update.update_id),
    }

    StatusCode::OK.into_response()
}

/// Log the event inline and spawn the reply
async fn accept(state: &AppState, binding: Option<ChannelBinding>, event: InboundEvent) {
    let channel = event.channel;
    let ingested = match binding {
        Some(binding) => state.channels.ingest_for(binding, event).await,
        None => state.channels.ingest(event).await,
    };

    match ingested {
        Ok(Some(pending)) => {
            drop(state.channels.dispatch(pending));
        }
        Ok(None) => {}
        Err(e) => error!("Failed to log inbound {} message: {}", channel, e),
    }
}
