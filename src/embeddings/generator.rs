//! Embedding generation service with preprocessing and dimension checks

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::client::EmbeddingClient;
use super::text_preprocessing::preprocess_text_for_embedding;
use super::Embedder;
use super::EmbeddingConfig;
use super::MAX_BATCH_SIZE;
use crate::errors::Result;
use crate::errors::ShopRagError;
use crate::retry::build_http_client;
use crate::retry::RetryPolicy;

/// Service for generating embeddings of the configured dimensionality
pub struct EmbeddingService {
    client: Arc<EmbeddingClient>,
    dimension: usize,
}

impl EmbeddingService {
    /// Create a new embedding service
    pub fn new(config: &crate::config::AppConfig) -> Result<Self> {
        let embedding_config = EmbeddingConfig::from_app_config(config)?;
        let http = build_http_client(&config.http)?;
        Ok(Self::from_config(
            embedding_config,
            http,
            RetryPolicy::from_config(&config.http),
        ))
    }

    /// Create from custom config
    #[must_use]
    pub fn from_config(config: EmbeddingConfig, http: reqwest::Client, retry: RetryPolicy) -> Self {
        let dimension = config.dimension;
        Self {
            client: Arc::new(EmbeddingClient::new(config, http, retry)),
            dimension,
        }
    }

    /// Generate embedding for a single text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let processed = preprocess_text_for_embedding(text)?;
        let embedding = self.client.generate(&processed).await?;
        self.check_dimension(embedding)
    }

    /// Generate embedding for text and/or an image
    pub async fn embed_multimodal(&self, text: Option<&str>, image: Option<&[u8]>) -> Result<Vec<f32>> {
        let processed = text.map(preprocess_text_for_embedding).transpose()?;
        let embedding = self
            .client
            .generate_multimodal(processed.as_deref(), image)
            .await?;
        self.check_dimension(embedding)
    }

    /// Generate embeddings for multiple texts, in input order
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let processed = texts
            .iter()
            .map(|t| preprocess_text_for_embedding(t))
            .collect::<Result<Vec<String>>>()?;

        let mut embeddings = Vec::with_capacity(processed.len());
        for chunk in processed.chunks(MAX_BATCH_SIZE) {
            let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
            for embedding in self.client.generate_batch(&refs).await? {
                embeddings.push(self.check_dimension(embedding)?);
            }
        }
        debug!("Generated {} embeddings", embeddings.len());
        Ok(embeddings)
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, embedding: Vec<f32>) -> Result<Vec<f32>> {
        if embedding.len() == self.dimension {
            Ok(embedding)
        } else {
            Err(ShopRagError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            })
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Self::embed(self, text).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
