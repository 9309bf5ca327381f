//! Complete RAG pipeline: Enhance -> Embed -> Retrieve + Complete

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::info_span;
use tracing::warn;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::embeddings::Embedder;
use crate::embeddings::EmbeddingService;
use crate::errors::Result;
use crate::errors::ShopRagError;
use crate::llm::ChatModel;
use crate::llm::GenerationParams;
use crate::llm::LlmService;
use crate::models::EnhancedQuery;
use crate::rag::CatalogSearch;
use crate::rag::Completer;
use crate::rag::ContextAssembler;
use crate::rag::QueryEnhancer;
use crate::rag::Retriever;
use crate::rag::RetrieverConfig;

/// Outcome of one orchestrated question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RagAnswer {
    /// Text to send to the customer; the apology when `failed`
    pub reply: String,
    pub query: EnhancedQuery,
    /// Embedding failed and retrieval ran keyword-only
    pub degraded: bool,
    /// Retrieval or completion failed and `reply` is the apology
    pub failed: bool,
}

/// Complete RAG service
///
/// Stateless; share it behind an `Arc`.
pub struct RagService {
    enhancer: QueryEnhancer,
    embedder: Arc<dyn Embedder>,
    completer: Completer,
    apology_message: String,
}

impl RagService {
    /// Create a new RAG service backed by the configured LLM and embedding providers
    ///
    /// # Errors
    /// - Embedding service configuration errors (unknown provider)
    /// - HTTP client build errors
    pub fn new(config: &AppConfig, catalog: Arc<dyn CatalogSearch>) -> Result<Self> {
        let llm: Arc<dyn ChatModel> = Arc::new(LlmService::new(config)?);
        let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingService::new(config)?);
        Ok(Self::from_services(config, catalog, embedder, llm))
    }

    /// Create from existing services
    #[must_use]
    pub fn from_services(
        config: &AppConfig,
        catalog: Arc<dyn CatalogSearch>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn ChatModel>,
    ) -> Self {
        let enhancer = QueryEnhancer::new(llm.clone(), config.enhancer.clone(), config.llm_model());
        let retriever = Retriever::new(catalog, RetrieverConfig::from_rag_config(&config.rag));
        let completer = Completer::new(
            retriever,
            ContextAssembler::new(config.rag.max_context_chars),
            llm,
            GenerationParams {
                model: config.llm.llm_model.clone(),
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
            },
        );

        Self {
            enhancer,
            embedder,
            completer,
            apology_message: config.rag.apology_message.clone(),
        }
    }

    /// Reply text for a customer message; never fails
    pub async fn run(&self, tenant_ids: &[Uuid], user_text: &str, conversation: Option<&str>) -> String {
        self.answer(tenant_ids, user_text, conversation).await.reply
    }

    /// Answer a customer message, reporting how the answer was produced
    ///
    /// Failures are logged and turned into the configured apology; raw errors
    /// never reach the caller.
    pub async fn answer(
        &self,
        tenant_ids: &[Uuid],
        user_text: &str,
        conversation: Option<&str>,
    ) -> RagAnswer {
        let span = info_span!("rag.answer", tenants = ?tenant_ids);
        self.answer_inner(tenant_ids, user_text, conversation)
            .instrument(span)
            .await
    }

    async fn answer_inner(
        &self,
        tenant_ids: &[Uuid],
        user_text: &str,
        conversation: Option<&str>,
    ) -> RagAnswer {
        if tenant_ids.is_empty() || user_text.trim().is_empty() {
            let reason = if tenant_ids.is_empty() {
                "no tenant resolved"
            } else {
                "empty message"
            };
            error!(tenants = ?tenant_ids, query = %user_text, "RAG request rejected: {}", reason);
            return self.apology(EnhancedQuery::unchanged(user_text), false);
        }

        info!("Processing RAG query: {}", user_text);

        // Step 1: Enhance
        debug!("Step 1: Enhancing query");
        let query = self.enhancer.enhance(user_text, conversation).await;

        // Step 2: Embed
        debug!("Step 2: Embedding query");
        let (embedding, degraded) = match self.embedder.embed(&query.optimized).await {
            Ok(embedding) => (Some(embedding), false),
            // Vectors of the wrong size cannot be compared against the catalog
            Err(e @ ShopRagError::DimensionMismatch { .. }) => {
                log_failure(tenant_ids, &query, &e);
                return self.apology(query, false);
            }
            Err(e) => {
                warn!(tenants = ?tenant_ids, "Embedding failed, falling back to keyword search: {}", e);
                (None, true)
            }
        };

        // Step 3: Retrieve and complete
        debug!("Step 3: Retrieving and generating answer");
        let completion: Result<String> = self
            .completer
            .complete(
                tenant_ids,
                embedding.as_deref(),
                &query.original,
                &query.optimized,
                conversation,
            )
            .await;

        match completion {
            Ok(reply) => {
                info!(degraded, "RAG query completed successfully");
                RagAnswer {
                    reply,
                    query,
                    degraded,
                    failed: false,
                }
            }
            Err(e) => {
                log_failure(tenant_ids, &query, &e);
                self.apology(query, degraded)
            }
        }
    }

    fn apology(&self, query: EnhancedQuery, degraded: bool) -> RagAnswer {
        RagAnswer {
            reply: self.apology_message.clone(),
            query,
            degraded,
            failed: true,
        }
    }

    #[must_use]
    pub fn apology_message(&self) -> &str {
        &self.apology_message
    }
}

fn log_failure(tenant_ids: &[Uuid], query: &EnhancedQuery, e: &ShopRagError) {
    error!(
        tenants = ?tenant_ids,
        query = %query.original,
        optimized = %query.optimized,
        transient = e.is_transient(),
        "RAG pipeline failed, replying with apology: {}",
        e
    );
}
