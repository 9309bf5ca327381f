//! End-to-end RAG pipeline behavior over in-memory collaborators

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::bag_of_words;
use common::product;
use common::test_config;
use common::word_set;
use common::Completion;
use common::FakeEmbedder;
use common::InMemoryCatalog;
use common::ScriptedChat;
use common::APOLOGY;
use serde_json::json;
use shoprag::embeddings::Embedder;
use shoprag::embeddings::EmbeddingConfig;
use shoprag::embeddings::EmbeddingProvider;
use shoprag::embeddings::EmbeddingService;
use shoprag::llm::prompts::NO_CATALOG_MATCHES;
use shoprag::llm::LlmService;
use shoprag::rag::CatalogSearch;
use shoprag::rag::RagService;
use shoprag::rag::Retriever;
use shoprag::rag::RetrieverConfig;
use shoprag::retry::RetryPolicy;
use shoprag::Result;
use shoprag::ShopRagError;
use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

fn two_shops() -> (Uuid, Uuid, InMemoryCatalog) {
    let shop_a = Uuid::new_v4();
    let shop_b = Uuid::new_v4();
    let catalog = InMemoryCatalog::new(vec![
        product(shop_a, "Red summer dress", "Light cotton dress in bright red"),
        product(shop_a, "Denim jacket", "Classic blue denim jacket"),
        product(shop_b, "Crimson dress", "Evening dress in deep red silk"),
        product(shop_b, "Red leather boots", "Knee high boots"),
    ]);
    (shop_a, shop_b, catalog)
}

fn rag(catalog: InMemoryCatalog, chat: Arc<ScriptedChat>, embedder_fails: bool) -> RagService {
    RagService::from_services(
        &test_config(),
        Arc::new(catalog),
        Arc::new(FakeEmbedder {
            fail: embedder_fails,
        }),
        chat,
    )
}

#[tokio::test]
async fn test_rewrite_keeps_every_original_word() {
    let (shop_a, _, catalog) = two_shops();
    let chat = Arc::new(ScriptedChat::new(
        Some("red dress women summer cotton"),
        Completion::Text("We have a red summer dress.".to_string()),
    ));
    let service = rag(catalog, chat.clone(), false);

    let answer = service.answer(&[shop_a], "red dress", None).await;

    assert!(!answer.failed);
    assert!(!answer.degraded);
    assert_eq!(answer.reply, "We have a red summer dress.");
    assert_eq!(answer.query.original, "red dress");
    assert!(answer.query.was_rewritten());
    assert!(word_set(&answer.query.original).is_subset(&word_set(&answer.query.optimized)));

    // The LLM sees the customer's own words, not the rewrite
    let user_messages = chat.user_messages.lock().unwrap().clone();
    assert_eq!(user_messages, vec!["red dress".to_string()]);
}

#[tokio::test]
async fn test_unrelated_rewrite_is_discarded() {
    let (shop_a, _, catalog) = two_shops();
    let chat = Arc::new(ScriptedChat::new(
        Some("cheap flights to paris"),
        Completion::Text("ok".to_string()),
    ));
    let service = rag(catalog, chat, false);

    let answer = service.answer(&[shop_a], "red dress", None).await;

    assert!(!answer.query.was_rewritten());
    assert_eq!(answer.query.optimized, "red dress");
}

#[tokio::test]
async fn test_query_embedding_has_configured_dimension() {
    let server = MockServer::start().await;
    let vector = vec![0.01_f32; 1408];
    Mock::given(method("POST"))
        .and(path(
            "/v1/projects/shop-project/locations/us-central1/publishers/google/models/multimodalembedding@001:predict",
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "predictions": [{ "textEmbedding": vector }] })),
        )
        .mount(&server)
        .await;

    let service = EmbeddingService::from_config(
        EmbeddingConfig {
            provider: EmbeddingProvider::Vertex,
            model: "multimodalembedding@001".to_string(),
            dimension: 1408,
            endpoint: server.uri(),
            api_key: Some("access-token".to_string()),
            region: "us-central1".to_string(),
            project_id: Some("shop-project".to_string()),
        },
        reqwest::Client::new(),
        RetryPolicy::none(),
    );

    let embedding = service.embed("red dress women summer").await.unwrap();
    assert_eq!(embedding.len(), 1408);
}

#[tokio::test]
async fn test_wrong_dimension_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "predictions": [{ "textEmbedding": vec![0.5_f32; 768] }] })),
        )
        .mount(&server)
        .await;

    let service = EmbeddingService::from_config(
        EmbeddingConfig {
            provider: EmbeddingProvider::Vertex,
            model: "multimodalembedding@001".to_string(),
            dimension: 1408,
            endpoint: server.uri(),
            api_key: Some("access-token".to_string()),
            region: "us-central1".to_string(),
            project_id: Some("shop-project".to_string()),
        },
        reqwest::Client::new(),
        RetryPolicy::none(),
    );

    let err = service.embed("red dress").await.unwrap_err();
    assert!(matches!(
        err,
        ShopRagError::DimensionMismatch {
            expected: 1408,
            actual: 768
        }
    ));
}

#[tokio::test]
async fn test_answers_never_mention_other_tenants_products() {
    let (shop_a, shop_b, catalog) = two_shops();
    let chat = Arc::new(ScriptedChat::new(None, Completion::EchoCatalog));
    let service = rag(catalog, chat.clone(), false);

    let answer = service.answer(&[shop_a], "red dress", None).await;

    assert!(!answer.failed);
    assert!(answer.reply.contains("Red summer dress"));
    assert!(!answer.reply.contains("Crimson dress"));
    assert!(!answer.reply.contains("Red leather boots"));

    let prompt = chat.last_system_prompt().unwrap();
    assert!(!prompt.contains("Crimson"));
    assert!(!prompt.contains("boots"));

    let answer = service.answer(&[shop_b], "red dress", None).await;
    assert!(answer.reply.contains("Crimson dress"));
    assert!(!answer.reply.contains("Red summer dress"));
}

#[tokio::test]
async fn test_retriever_only_returns_requested_tenants() {
    let (shop_a, shop_b, catalog) = two_shops();
    let catalog: Arc<dyn CatalogSearch> = Arc::new(catalog);
    let retriever = Retriever::new(
        catalog,
        RetrieverConfig::from_rag_config(&test_config().rag),
    );

    let embedding = bag_of_words("red dress");
    let results = retriever
        .search(&[shop_a], Some(embedding.as_slice()), "red dress")
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.product.tenant_id == shop_a));

    let both = retriever
        .search(&[shop_a, shop_b], Some(embedding.as_slice()), "red dress")
        .await
        .unwrap();
    assert!(both.iter().any(|r| r.product.tenant_id == shop_b));
}

#[tokio::test]
async fn test_llm_outage_yields_apology() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let (shop_a, _, catalog) = two_shops();
    let llm = LlmService::with_client(
        reqwest::Client::new(),
        &server.uri(),
        "sk-test",
        RetryPolicy::none(),
    );
    let service = RagService::from_services(
        &test_config(),
        Arc::new(catalog),
        Arc::new(FakeEmbedder { fail: false }),
        Arc::new(llm),
    );

    let answer = service.answer(&[shop_a], "red dress", None).await;

    assert!(answer.failed);
    assert_eq!(answer.reply, APOLOGY);
    assert_eq!(answer.query.optimized, answer.query.original);
    assert!(!answer.reply.contains("upstream exploded"));
}

#[tokio::test]
async fn test_embedding_outage_falls_back_to_keywords() {
    let (shop_a, _, catalog) = two_shops();
    let chat = Arc::new(ScriptedChat::new(None, Completion::EchoCatalog));
    let service = rag(catalog, chat, true);

    let answer = service.answer(&[shop_a], "denim jacket", None).await;

    assert!(answer.degraded);
    assert!(!answer.failed);
    assert!(answer.reply.contains("Denim jacket"));
}

/// Embedder configured for a different model than the catalog was indexed with
struct MismatchedEmbedder;

#[async_trait]
impl Embedder for MismatchedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(ShopRagError::DimensionMismatch {
            expected: 1408,
            actual: 768,
        })
    }

    fn dimension(&self) -> usize {
        1408
    }
}

#[tokio::test]
async fn test_dimension_mismatch_yields_apology_not_keyword_fallback() {
    let (shop_a, _, catalog) = two_shops();
    let chat = Arc::new(ScriptedChat::new(None, Completion::EchoCatalog));
    let service = RagService::from_services(
        &test_config(),
        Arc::new(catalog),
        Arc::new(MismatchedEmbedder),
        chat.clone(),
    );

    let answer = service.answer(&[shop_a], "denim jacket", None).await;

    assert!(answer.failed);
    assert!(!answer.degraded);
    assert_eq!(answer.reply, APOLOGY);
    assert!(chat.last_system_prompt().is_none());
}

#[tokio::test]
async fn test_no_matches_still_answers() {
    let (shop_a, _, catalog) = two_shops();
    let chat = Arc::new(ScriptedChat::replying("We don't carry that, sorry."));
    let service = rag(catalog, chat.clone(), true);

    let answer = service.answer(&[shop_a], "garden hose", None).await;

    assert!(!answer.failed);
    assert!(chat.last_system_prompt().unwrap().contains(NO_CATALOG_MATCHES));
}

#[tokio::test]
async fn test_empty_tenant_set_yields_apology() {
    let (_, _, catalog) = two_shops();
    let chat = Arc::new(ScriptedChat::replying("should not be called"));
    let service = rag(catalog, chat.clone(), false);

    let answer = service.answer(&[], "red dress", None).await;

    assert!(answer.failed);
    assert_eq!(answer.reply, APOLOGY);
    assert!(chat.last_system_prompt().is_none());
}

#[tokio::test]
async fn test_conversation_reaches_the_prompt() {
    let (shop_a, _, catalog) = two_shops();
    let chat = Arc::new(ScriptedChat::replying("Yes, size M is available."));
    let service = rag(catalog, chat.clone(), false);

    let conversation = "user: do you have the red summer dress?\nbot: Yes, we do.";
    service
        .answer(&[shop_a], "is it in size M?", Some(conversation))
        .await;

    let prompt = chat.last_system_prompt().unwrap();
    assert!(prompt.contains("user: do you have the red summer dress?"));
    assert!(prompt.contains("bot: Yes, we do."));
}
