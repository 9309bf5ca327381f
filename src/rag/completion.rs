//! Retrieval-grounded answer generation

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::errors::Result;
use crate::errors::ShopRagError;
use crate::llm::prompts::NO_CATALOG_MATCHES;
use crate::llm::prompts::NO_CONVERSATION;
use crate::llm::ChatModel;
use crate::llm::GenerationParams;
use crate::llm::LlmMessage;
use crate::llm::ShopPrompts;
use crate::rag::ContextAssembler;
use crate::rag::Retriever;
use crate::rag::SearchResult;

/// Retrieves catalog context for a question and asks the LLM to answer it
pub struct Completer {
    retriever: Retriever,
    context_assembler: ContextAssembler,
    llm: Arc<dyn ChatModel>,
    params: GenerationParams,
}

impl Completer {
    #[must_use]
    pub fn new(
        retriever: Retriever,
        context_assembler: ContextAssembler,
        llm: Arc<dyn ChatModel>,
        params: GenerationParams,
    ) -> Self {
        Self {
            retriever,
            context_assembler,
            llm,
            params,
        }
    }

    /// Answer `original` using products retrieved for `optimized`
    ///
    /// # Errors
    /// - Retrieval errors (empty tenant set, database failures)
    /// - LLM failures, including an empty reply
    pub async fn complete(
        &self,
        tenant_ids: &[Uuid],
        query_embedding: Option<&[f32]>,
        original: &str,
        optimized: &str,
        conversation: Option<&str>,
    ) -> Result<String> {
        let results = self
            .retriever
            .search(tenant_ids, query_embedding, optimized)
            .await?;
        debug!("Retrieved {} results", results.len());

        let messages = self.build_messages(&results, original, conversation);
        let reply = self.llm.chat(&messages, &self.params).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(ShopRagError::LlmError(
                "completion returned an empty reply".to_string(),
            ));
        }
        Ok(reply.to_string())
    }

    /// System prompt with the catalog context, then the customer's own words
    #[must_use]
    pub fn build_messages(
        &self,
        results: &[SearchResult],
        original: &str,
        conversation: Option<&str>,
    ) -> Vec<LlmMessage> {
        let context = self.context_assembler.assemble(results);
        let context = if context.is_empty() {
            NO_CATALOG_MATCHES
        } else {
            context.as_str()
        };
        let conversation = conversation
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(NO_CONVERSATION);

        let system = ShopPrompts::shop_assistant().render(&HashMap::from([
            ("context", context),
            ("conversation", conversation),
        ]));

        vec![LlmMessage::system(system), LlmMessage::user(original.trim())]
    }
}
