//! RAG (Retrieval-Augmented Generation) module
//!
//! Answers customer questions from a tenant's product catalog:
//! - Query enhancement using conversational context
//! - Tenant-scoped hybrid retrieval (vector similarity + keyword matching)
//! - Context assembly from retrieved products
//! - LLM-based answer generation
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use shoprag::config::AppConfig;
//! use shoprag::database::Database;
//! use shoprag::rag::RagService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let database = Arc::new(Database::from_config(&config).await?);
//!     let service = RagService::new(&config, database)?;
//!
//!     let tenant = uuid::Uuid::new_v4();
//!     let reply = service.run(&[tenant], "do you have red dresses?", None).await;
//!     println!("Reply: {reply}");
//!
//!     Ok(())
//! }
//! ```

pub mod completion;
pub mod context;
pub mod enhancer;
pub mod pipeline;
pub mod retriever;

use async_trait::async_trait;
use uuid::Uuid;

pub use completion::Completer;
pub use context::ContextAssembler;
pub use enhancer::QueryEnhancer;
pub use pipeline::RagAnswer;
pub use pipeline::RagService;
pub use retriever::Reranker;
pub use retriever::Retriever;
pub use retriever::RetrieverConfig;

use crate::errors::Result;
use crate::models::Product;
use crate::models::ScoredProduct;

/// Search result with relevance score
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub product: Product,
    pub score: f32,
    pub match_type: MatchType,
}

/// Type of match for the search result
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Vector similarity match
    Semantic,
    /// Text keyword match
    Keyword,
    /// Found by both signals
    Hybrid,
}

/// Tenant-scoped catalog queries
///
/// Implementations must only return products whose `tenant_id` is in
/// `tenant_ids`; the retriever re-checks this anyway.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    /// Nearest products by cosine similarity, best first, ties by id
    async fn semantic_search(
        &self,
        tenant_ids: &[Uuid],
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredProduct>>;

    /// Products matching any term, scored by the share of terms matched
    async fn keyword_search(
        &self,
        tenant_ids: &[Uuid],
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<ScoredProduct>>;
}
