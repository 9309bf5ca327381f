//! HTTP surface: channel webhooks and the operator API

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use axum::Router;
use common::membership;
use common::messenger_binding;
use common::product;
use common::telegram_binding;
use common::Completion;
use common::Harness;
use common::HarnessBuilder;
use common::InMemoryDirectory;
use common::ScriptedChat;
use common::APOLOGY;
use common::APP_SECRET;
use common::VERIFY_TOKEN;
use serde_json::json;
use serde_json::Value;
use shoprag::api::build_router;
use shoprag::api::AppState;
use shoprag::channels::signature::compute_hmac_sha256_hex;
use shoprag::memory::MemoryStore;
use shoprag::models::ChannelKind;
use shoprag::models::SenderRole;
use shoprag::models::SessionKey;
use tower::ServiceExt;
use uuid::Uuid;

const PAGE_ID: &str = "1001";
const BOT_ID: &str = "777";
const BOT_SECRET: &str = "s3cr3t-path";

struct Shop {
    owner: Uuid,
    tenant: Uuid,
    harness: Harness,
    router: Router,
}

fn shop_with(chat: ScriptedChat, configure: impl FnOnce(&mut HarnessBuilder)) -> Shop {
    let owner = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    let directory = InMemoryDirectory {
        bindings: vec![
            messenger_binding(PAGE_ID, owner, None),
            telegram_binding(BOT_ID, BOT_SECRET, owner, None),
        ],
        memberships: vec![membership(owner, tenant, 1)],
    };

    let mut builder = HarnessBuilder::new(directory, chat);
    builder.products = vec![product(tenant, "Red summer dress", "Light cotton dress")];
    configure(&mut builder);
    let harness = builder.build();

    let state = AppState::new(Arc::new(harness.config.clone()), harness.service.clone());
    Shop {
        owner,
        tenant,
        router: build_router(state),
        harness,
    }
}

fn shop(chat: ScriptedChat) -> Shop {
    shop_with(chat, |_| {})
}

fn messenger_body(sender: &str, text: &str) -> String {
    json!({
        "object": "page",
        "entry": [{
            "id": PAGE_ID,
            "time": 1_700_000_000_000_i64,
            "messaging": [{
                "sender": { "id": sender },
                "recipient": { "id": PAGE_ID },
                "timestamp": 1_700_000_000_000_i64,
                "message": { "mid": "m_1", "text": text }
            }]
        }]
    })
    .to_string()
}

fn signed_messenger_request(body: &str, secret: &str) -> Request<Body> {
    let signature = compute_hmac_sha256_hex(secret.as_bytes(), body.as_bytes()).unwrap();
    Request::builder()
        .method("POST")
        .uri("/webhooks/messenger")
        .header("content-type", "application/json")
        .header("x-hub-signature-256", format!("sha256={signature}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn telegram_body(chat_id: i64, from_id: i64, text: &str) -> String {
    json!({
        "update_id": 42,
        "message": {
            "message_id": 7,
            "date": 1_700_000_000,
            "from": { "id": from_id, "is_bot": false, "first_name": "Lan" },
            "chat": { "id": chat_id, "type": "private" },
            "text": text
        }
    })
    .to_string()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_messenger_handshake_echoes_challenge() {
    let shop = shop(ScriptedChat::replying("hi"));

    let response = shop
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/webhooks/messenger?hub.mode=subscribe&hub.verify_token={VERIFY_TOKEN}&hub.challenge=1158201444"
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"1158201444");

    let response = shop
        .router
        .oneshot(
            Request::builder()
                .uri("/webhooks/messenger?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bad_signature_is_rejected_without_side_effects() {
    let shop = shop(ScriptedChat::replying("hi"));
    let body = messenger_body("psid-1", "do you have red dresses?");

    let response = shop
        .router
        .clone()
        .oneshot(signed_messenger_request(&body, "not-the-app-secret"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let unsigned = Request::builder()
        .method("POST")
        .uri("/webhooks/messenger")
        .body(Body::from(body))
        .unwrap();
    let response = shop.router.oneshot(unsigned).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(shop.harness.store.session_count(), 0);
    assert_eq!(shop.harness.store.message_count(), 0);
    assert!(shop.harness.messenger.sent().is_empty());
}

#[tokio::test]
async fn test_signed_message_is_logged_and_answered() {
    let shop = shop(ScriptedChat::replying("Yes, the Red summer dress is in stock."));
    let body = messenger_body("psid-1", "do you have red dresses?");

    let response = shop
        .router
        .clone()
        .oneshot(signed_messenger_request(&body, APP_SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let sent = shop.harness.messenger.wait_for(1).await;
    assert_eq!(
        sent,
        vec![(
            "psid-1".to_string(),
            "Yes, the Red summer dress is in stock.".to_string()
        )]
    );

    let session = shop
        .harness
        .store
        .open_session(&SessionKey {
            owner_id: shop.owner,
            tenant_id: shop.tenant,
            channel: ChannelKind::Messenger,
            external_user_id: "psid-1".to_string(),
        })
        .await
        .unwrap();
    let history = shop
        .harness
        .store
        .recent_messages(&session, 10, None)
        .await
        .unwrap();
    let turns: Vec<(SenderRole, &str)> = history
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        turns,
        vec![
            (SenderRole::User, "do you have red dresses?"),
            (SenderRole::Bot, "Yes, the Red summer dress is in stock."),
        ]
    );
}

#[tokio::test]
async fn test_llm_outage_still_acknowledges_and_apologizes() {
    let shop = shop(ScriptedChat::new(None, Completion::Fail));
    let body = messenger_body("psid-9", "do you have red dresses?");

    let response = shop
        .router
        .clone()
        .oneshot(signed_messenger_request(&body, APP_SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let sent = shop.harness.messenger.wait_for(1).await;
    assert_eq!(sent, vec![("psid-9".to_string(), APOLOGY.to_string())]);
}

#[tokio::test]
async fn test_unknown_page_is_acknowledged_and_ignored() {
    let shop = shop(ScriptedChat::replying("hi"));
    let body = messenger_body("psid-1", "hello").replace(PAGE_ID, "9999");

    let response = shop
        .router
        .clone()
        .oneshot(signed_messenger_request(&body, APP_SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(shop.harness.store.session_count(), 0);
    assert_eq!(shop.harness.store.message_count(), 0);
}

#[tokio::test]
async fn test_malformed_messenger_payload_is_bad_request() {
    let shop = shop(ScriptedChat::replying("hi"));

    let response = shop
        .router
        .oneshot(signed_messenger_request("{not json", APP_SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_app_secret_is_service_unavailable() {
    let shop = shop_with(ScriptedChat::replying("hi"), |builder| {
        builder.config.messenger.app_secret = String::new();
    });
    let body = messenger_body("psid-1", "hello");

    let response = shop
        .router
        .oneshot(signed_messenger_request(&body, APP_SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(shop.harness.store.message_count(), 0);
}

#[tokio::test]
async fn test_telegram_unknown_secret_is_unauthorized() {
    let shop = shop(ScriptedChat::replying("hi"));

    let response = shop
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/telegram/unknown-secret")
                .body(Body::from(telegram_body(5, 5, "hello")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(shop.harness.store.message_count(), 0);
}

#[tokio::test]
async fn test_telegram_header_mismatch_is_unauthorized() {
    let shop = shop(ScriptedChat::replying("hi"));

    let response = shop
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/webhooks/telegram/{BOT_SECRET}"))
                .header("x-telegram-bot-api-secret-token", "something-else")
                .body(Body::from(telegram_body(5, 5, "hello")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(shop.harness.store.message_count(), 0);
}

#[tokio::test]
async fn test_telegram_reply_goes_to_chat() {
    let shop = shop(ScriptedChat::replying("We have a Red summer dress."));

    let response = shop
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/webhooks/telegram/{BOT_SECRET}"))
                .header("x-telegram-bot-api-secret-token", BOT_SECRET)
                .body(Body::from(telegram_body(-100_123, 555, "red dress?")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let sent = shop.harness.telegram.wait_for(1).await;
    assert_eq!(
        sent,
        vec![("-100123".to_string(), "We have a Red summer dress.".to_string())]
    );
    assert!(shop.harness.messenger.sent().is_empty());
}

#[tokio::test]
async fn test_telegram_non_text_update_is_ignored() {
    let shop = shop(ScriptedChat::replying("hi"));
    let sticker = json!({
        "update_id": 43,
        "message": {
            "message_id": 8,
            "date": 1_700_000_000,
            "from": { "id": 5, "is_bot": false, "first_name": "Lan" },
            "chat": { "id": 5, "type": "private" },
            "sticker": { "file_id": "abc" }
        }
    });

    let response = shop
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/webhooks/telegram/{BOT_SECRET}"))
                .body(Body::from(sticker.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(shop.harness.store.message_count(), 0);
}

#[tokio::test]
async fn test_health_is_open() {
    let shop = shop_with(ScriptedChat::replying("hi"), |builder| {
        builder.config.server.api_key = Some("operator-key".to_string());
    });

    let response = shop
        .router
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
async fn test_operator_api_requires_key() {
    let shop = shop_with(ScriptedChat::replying("hi"), |builder| {
        builder.config.server.api_key = Some("operator-key".to_string());
    });
    let owner = shop.owner;

    let response = shop
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/memory/{owner}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = shop
        .router
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/memory/{owner}"))
                .header("authorization", "Bearer operator-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rag_query_validates_input() {
    let shop = shop(ScriptedChat::replying("hi"));

    let response = shop
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/rag/query")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "tenant_ids": [], "question": "red dress?" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_rag_query_answers_for_tenants() {
    let shop = shop(ScriptedChat::replying("The Red summer dress is available."));
    let tenant = shop.tenant;

    let response = shop
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/rag/query")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "tenant_ids": [tenant], "question": "red dress?" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["reply"], "The Red summer dress is available.");
    assert_eq!(body["data"]["original_query"], "red dress?");
    assert_eq!(body["data"]["failed"], false);
}

#[tokio::test]
async fn test_clear_memory_is_idempotent() {
    let shop = shop(ScriptedChat::replying("Sure."));
    let body = messenger_body("psid-1", "hello");
    shop.router
        .clone()
        .oneshot(signed_messenger_request(&body, APP_SECRET))
        .await
        .unwrap();
    shop.harness.messenger.wait_for(1).await;

    let clear = |owner: Uuid| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/memory/{owner}"))
            .body(Body::empty())
            .unwrap()
    };

    let response = shop.router.clone().oneshot(clear(shop.owner)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    // one session, one user message, one bot message
    assert_eq!(first["data"]["deleted"], 3);

    let response = shop.router.oneshot(clear(shop.owner)).await.unwrap();
    let second = body_json(response).await;
    assert_eq!(second["data"]["deleted"], 0);
    assert_eq!(shop.harness.store.session_count(), 0);
}
