//! Embeddings generation module
//!
//! Turns customer questions and catalog entries into fixed-length vectors
//! using one of the supported providers:
//! - Vertex AI multimodal embeddings (text and image, 1408 dimensions)
//! - OpenAI compatible `/embeddings` endpoints
//! - Ollama (local models)
//!
//! # Examples
//!
//! ```rust,no_run
//! use shoprag::embeddings::EmbeddingService;
//! use shoprag::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let service = EmbeddingService::new(&config)?;
//!
//!     let embedding = service.embed("red summer dress").await?;
//!     println!("Generated embedding with {} dimensions", embedding.len());
//!
//!     Ok(())
//! }
//! ```

pub mod backfill;
pub mod client;
pub mod generator;
pub mod text_preprocessing;

use async_trait::async_trait;
pub use backfill::backfill_product_embeddings;
pub use backfill::BackfillStats;
pub use client::EmbeddingClient;
pub use client::EmbeddingProvider;
pub use generator::EmbeddingService;
pub use text_preprocessing::preprocess_text_for_embedding;

use crate::errors::Result;

/// Maximum batch size for embedding generation
pub const MAX_BATCH_SIZE: usize = 100;

/// Anything that can embed a search query
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length every returned vector must have
    fn dimension(&self) -> usize;
}

/// Configuration for embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimension: usize,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub region: String,
    pub project_id: Option<String>,
}

impl EmbeddingConfig {
    pub fn from_app_config(config: &crate::config::AppConfig) -> Result<Self> {
        let section = &config.embeddings;
        Ok(Self {
            provider: EmbeddingProvider::parse(&section.provider)?,
            model: section.model.clone(),
            dimension: section.dimension,
            endpoint: section.endpoint.clone(),
            api_key: section.api_key.clone(),
            region: section.region.clone(),
            project_id: section.project_id.clone(),
        })
    }
}
