//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeZone;
use chrono::Utc;
use shoprag::channels::ChannelDirectory;
use shoprag::channels::ChannelSender;
use shoprag::channels::ChannelService;
use shoprag::config::AppConfig;
use shoprag::embeddings::Embedder;
use shoprag::llm::ChatModel;
use shoprag::llm::GenerationParams;
use shoprag::llm::LlmMessage;
use shoprag::memory::InMemoryStore;
use shoprag::models::ChannelBinding;
use shoprag::models::ChannelKind;
use shoprag::models::Product;
use shoprag::models::ScoredProduct;
use shoprag::models::TenantMembership;
use shoprag::rag::CatalogSearch;
use shoprag::rag::RagService;
use shoprag::rate_limit::RateLimiter;
use shoprag::rate_limit::Unlimited;
use shoprag::Result;
use shoprag::ShopRagError;
use uuid::Uuid;

pub const DIMENSION: usize = 16;
pub const APP_SECRET: &str = "app-secret";
pub const VERIFY_TOKEN: &str = "verify-me";
pub const APOLOGY: &str = "Sorry, something went wrong. Please try again.";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.embeddings.dimension = DIMENSION;
    config.messenger.app_secret = APP_SECRET.to_string();
    config.messenger.verify_token = VERIFY_TOKEN.to_string();
    config.rag.apology_message = APOLOGY.to_string();
    config.rag.context_turns = 4;
    config
}

pub fn product(tenant_id: Uuid, name: &str, description: &str) -> Product {
    Product {
        id: Uuid::new_v4(),
        tenant_id,
        name: name.to_string(),
        description: Some(description.to_string()),
        category: None,
        price: None,
        currency: None,
        stock_quantity: Some(3),
        image_url: None,
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Bag-of-words vector; texts sharing words point in similar directions
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSION];
    for word in words(text) {
        let bucket = word.bytes().map(usize::from).sum::<usize>() % DIMENSION;
        vector[bucket] += 1.0;
    }
    vector
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Catalog honoring the tenant filter like the SQL implementation
#[derive(Default)]
pub struct InMemoryCatalog {
    products: Vec<(Product, Vec<f32>)>,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: products
                .into_iter()
                .map(|p| {
                    let embedding = bag_of_words(&p.embedding_text());
                    (p, embedding)
                })
                .collect(),
        }
    }
}

fn sort_scored(results: &mut Vec<ScoredProduct>) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.product.id.cmp(&b.product.id))
    });
}

#[async_trait]
impl CatalogSearch for InMemoryCatalog {
    async fn semantic_search(
        &self,
        tenant_ids: &[Uuid],
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredProduct>> {
        let mut results: Vec<ScoredProduct> = self
            .products
            .iter()
            .filter(|(p, _)| tenant_ids.contains(&p.tenant_id))
            .map(|(p, e)| ScoredProduct {
                product: p.clone(),
                score: cosine(embedding, e),
            })
            .collect();
        sort_scored(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn keyword_search(
        &self,
        tenant_ids: &[Uuid],
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<ScoredProduct>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let mut results: Vec<ScoredProduct> = self
            .products
            .iter()
            .filter(|(p, _)| tenant_ids.contains(&p.tenant_id))
            .filter_map(|(p, _)| {
                let haystack = format!(
                    "{} {} {}",
                    p.name,
                    p.description.as_deref().unwrap_or_default(),
                    p.category.as_deref().unwrap_or_default()
                )
                .to_lowercase();
                let matched = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (matched > 0).then(|| ScoredProduct {
                    product: p.clone(),
                    score: matched as f32 / terms.len() as f32,
                })
            })
            .collect();
        sort_scored(&mut results);
        results.truncate(limit);
        Ok(results)
    }
}

/// Deterministic embedder, optionally failing every call
pub struct FakeEmbedder {
    pub fail: bool,
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail {
            return Err(ShopRagError::EmbeddingError("embedding service down".to_string()));
        }
        Ok(bag_of_words(text))
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// What the fake LLM answers to completion calls
#[derive(Clone)]
pub enum Completion {
    /// Reply with this text
    Text(String),
    /// Reply with the names of the products found in the system prompt
    EchoCatalog,
    /// Fail like an unreachable endpoint
    Fail,
    /// Reply "answer to <question>", taking `delay` for `slow_question`
    Answering {
        slow_question: String,
        delay: Duration,
    },
}

/// Chat model that tells query rewrites (one user message) from completions
/// (system + user) and records every system prompt it receives
pub struct ScriptedChat {
    rewrite: Option<String>,
    completion: Completion,
    pub system_prompts: Mutex<Vec<String>>,
    pub user_messages: Mutex<Vec<String>>,
}

impl ScriptedChat {
    pub fn new(rewrite: Option<&str>, completion: Completion) -> Self {
        Self {
            rewrite: rewrite.map(str::to_string),
            completion,
            system_prompts: Mutex::new(Vec::new()),
            user_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(None, Completion::Text(text.to_string()))
    }

    pub fn last_system_prompt(&self) -> Option<String> {
        self.system_prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn chat(&self, messages: &[LlmMessage], _params: &GenerationParams) -> Result<String> {
        if messages.len() == 1 {
            return self
                .rewrite
                .clone()
                .ok_or_else(|| ShopRagError::LlmError("rewrite unavailable".to_string()));
        }

        let system = messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let question = messages
            .iter()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.user_messages.lock().unwrap().push(question.clone());
        self.system_prompts.lock().unwrap().push(system.clone());

        match &self.completion {
            Completion::Text(text) => Ok(text.clone()),
            Completion::EchoCatalog => Ok(system
                .lines()
                .filter_map(|l| l.strip_prefix("Name: "))
                .collect::<Vec<_>>()
                .join(", ")),
            Completion::Fail => Err(ShopRagError::Upstream {
                service: "llm",
                status: 500,
                body: "internal error".to_string(),
            }),
            Completion::Answering {
                slow_question,
                delay,
            } => {
                if question == *slow_question {
                    tokio::time::sleep(*delay).await;
                }
                Ok(format!("answer to {question}"))
            }
        }
    }
}

/// Bindings and memberships held in memory
#[derive(Default)]
pub struct InMemoryDirectory {
    pub bindings: Vec<ChannelBinding>,
    pub memberships: Vec<TenantMembership>,
}

#[async_trait]
impl ChannelDirectory for InMemoryDirectory {
    async fn find_binding(
        &self,
        channel: ChannelKind,
        external_id: &str,
    ) -> Result<Option<ChannelBinding>> {
        Ok(self
            .bindings
            .iter()
            .find(|b| b.channel == channel && b.external_id == external_id)
            .cloned())
    }

    async fn find_telegram_by_secret(&self, secret: &str) -> Result<Option<ChannelBinding>> {
        Ok(self
            .bindings
            .iter()
            .find(|b| {
                b.channel == ChannelKind::Telegram && b.webhook_secret.as_deref() == Some(secret)
            })
            .cloned())
    }

    async fn memberships_for_owner(&self, owner_id: Uuid) -> Result<Vec<TenantMembership>> {
        Ok(self
            .memberships
            .iter()
            .filter(|m| m.user_id == owner_id)
            .cloned()
            .collect())
    }
}

pub fn membership(user_id: Uuid, tenant_id: Uuid, day: u32) -> TenantMembership {
    TenantMembership {
        user_id,
        tenant_id,
        created_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
    }
}

pub fn messenger_binding(page_id: &str, owner_id: Uuid, tenant_id: Option<Uuid>) -> ChannelBinding {
    ChannelBinding {
        channel: ChannelKind::Messenger,
        external_id: page_id.to_string(),
        owner_id,
        tenant_id,
        credential: "page-token".to_string(),
        webhook_secret: None,
        display_name: Some("Test Shop".to_string()),
    }
}

pub fn telegram_binding(bot_id: &str, secret: &str, owner_id: Uuid, tenant_id: Option<Uuid>) -> ChannelBinding {
    ChannelBinding {
        channel: ChannelKind::Telegram,
        external_id: bot_id.to_string(),
        owner_id,
        tenant_id,
        credential: "bot-token".to_string(),
        webhook_secret: Some(secret.to_string()),
        display_name: Some("test_shop_bot".to_string()),
    }
}

/// Sender that records deliveries, optionally failing them
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, String)>>,
    pub typing: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait for background replies to arrive
    pub async fn wait_for(&self, count: usize) -> Vec<(String, String)> {
        for _ in 0..200 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl ChannelSender for RecordingSender {
    async fn send_text(&self, _binding: &ChannelBinding, recipient: &str, text: &str) -> Result<()> {
        if self.fail {
            return Err(ShopRagError::ChannelError("recipient blocked the page".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }

    async fn typing(&self, _binding: &ChannelBinding, recipient: &str) -> Result<()> {
        self.typing.lock().unwrap().push(recipient.to_string());
        Ok(())
    }
}

/// Everything a channel test needs, wired together
pub struct Harness {
    pub config: AppConfig,
    pub store: Arc<InMemoryStore>,
    pub chat: Arc<ScriptedChat>,
    pub messenger: Arc<RecordingSender>,
    pub telegram: Arc<RecordingSender>,
    pub service: ChannelService,
}

pub struct HarnessBuilder {
    pub config: AppConfig,
    pub products: Vec<Product>,
    pub directory: InMemoryDirectory,
    pub chat: ScriptedChat,
    pub limiter: Arc<dyn RateLimiter>,
    pub failing_sender: bool,
}

impl HarnessBuilder {
    pub fn new(directory: InMemoryDirectory, chat: ScriptedChat) -> Self {
        Self {
            config: test_config(),
            products: Vec::new(),
            directory,
            chat,
            limiter: Arc::new(Unlimited),
            failing_sender: false,
        }
    }

    pub fn build(self) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let chat = Arc::new(self.chat);
        let rag = Arc::new(RagService::from_services(
            &self.config,
            Arc::new(InMemoryCatalog::new(self.products)),
            Arc::new(FakeEmbedder { fail: false }),
            chat.clone(),
        ));
        let messenger = Arc::new(RecordingSender {
            fail: self.failing_sender,
            ..RecordingSender::default()
        });
        let telegram = Arc::new(RecordingSender {
            fail: self.failing_sender,
            ..RecordingSender::default()
        });
        let service = ChannelService::new(
            Arc::new(self.directory),
            store.clone(),
            rag,
            self.limiter,
            messenger.clone(),
            telegram.clone(),
            &self.config.rag,
        );

        Harness {
            config: self.config,
            store,
            chat,
            messenger,
            telegram,
            service,
        }
    }
}

/// Distinct words, used to compare queries
pub fn word_set(text: &str) -> HashSet<String> {
    words(text).into_iter().collect()
}
