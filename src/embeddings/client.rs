//! Embedding API clients for the supported providers

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::EmbeddingConfig;
use crate::errors::Result;
use crate::errors::ShopRagError;
use crate::retry::RetryPolicy;

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Vertex AI multimodal embeddings (text and image)
    Vertex,
    /// `OpenAI` compatible `/embeddings` API
    OpenAI,
    /// Ollama local embeddings
    Ollama,
}

impl EmbeddingProvider {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "vertex" | "vertexai" | "google" => Ok(Self::Vertex),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            other => Err(ShopRagError::ConfigError(format!(
                "unknown embeddings.provider: {other}"
            ))),
        }
    }

    #[must_use]
    pub const fn supports_images(self) -> bool {
        matches!(self, Self::Vertex)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::OpenAI => "openai",
            Self::Ollama => "ollama",
        }
    }
}

/// Client for generating embeddings from the configured provider
pub struct EmbeddingClient {
    config: EmbeddingConfig,
    client: Client,
    retry: RetryPolicy,
}

impl EmbeddingClient {
    #[must_use]
    pub fn new(config: EmbeddingConfig, client: Client, retry: RetryPolicy) -> Self {
        Self {
            config,
            client,
            retry,
        }
    }

    #[must_use]
    pub const fn provider(&self) -> EmbeddingProvider {
        self.config.provider
    }

    /// Generate embedding for a single text
    ///
    /// # Errors
    /// - API request failures after retries (network errors, timeouts, 5xx)
    /// - Invalid API responses (malformed JSON, missing embedding)
    pub async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        match self.config.provider {
            EmbeddingProvider::Vertex => self.generate_vertex(Some(text), None).await,
            EmbeddingProvider::OpenAI => self.generate_openai(text).await,
            EmbeddingProvider::Ollama => self.generate_ollama(text).await,
        }
    }

    /// Generate one embedding for text and/or image bytes
    ///
    /// When both are supplied the text embedding is returned; the provider
    /// places text and image in the same space.
    pub async fn generate_multimodal(
        &self,
        text: Option<&str>,
        image: Option<&[u8]>,
    ) -> Result<Vec<f32>> {
        match (self.config.provider, text, image) {
            (_, None, None) => Err(ShopRagError::InvalidInput(
                "either text or image is required".to_string(),
            )),
            (EmbeddingProvider::Vertex, text, image) => self.generate_vertex(text, image).await,
            (provider, _, Some(_)) => Err(ShopRagError::ConfigError(format!(
                "embedding provider {} does not support image input",
                provider.as_str()
            ))),
            (_, Some(text), None) => self.generate(text).await,
        }
    }

    /// Generate embeddings for multiple texts
    pub async fn generate_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        match self.config.provider {
            EmbeddingProvider::OpenAI => self.generate_batch_openai(texts).await,
            EmbeddingProvider::Vertex | EmbeddingProvider::Ollama => {
                use futures::stream::StreamExt;
                use futures::stream::{
                    self,
                };

                let concurrency = texts.len().clamp(1, 8);
                let results: Vec<Result<Vec<f32>>> = stream::iter(texts.iter())
                    .map(|&text| async move { self.generate(text).await })
                    .buffered(concurrency)
                    .collect()
                    .await;

                results.into_iter().collect()
            }
        }
    }

    fn vertex_url(&self) -> Result<String> {
        let project = self.config.project_id.as_deref().ok_or_else(|| {
            ShopRagError::ConfigError("embeddings.project_id is required for vertex".to_string())
        })?;
        let region = &self.config.region;
        let base = if self.config.endpoint.is_empty() {
            format!("https://{region}-aiplatform.googleapis.com")
        } else {
            self.config.endpoint.trim_end_matches('/').to_string()
        };
        Ok(format!(
            "{base}/v1/projects/{project}/locations/{region}/publishers/google/models/{}:predict",
            self.config.model
        ))
    }

    /// Generate embedding using the Vertex AI multimodal `:predict` endpoint
    async fn generate_vertex(&self, text: Option<&str>, image: Option<&[u8]>) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct VertexImage {
            #[serde(rename = "bytesBase64Encoded")]
            bytes_base64_encoded: String,
        }

        #[derive(Serialize)]
        struct VertexInstance<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            text: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            image: Option<VertexImage>,
        }

        #[derive(Serialize)]
        struct VertexParameters {
            dimension: usize,
        }

        #[derive(Serialize)]
        struct VertexRequest<'a> {
            instances: Vec<VertexInstance<'a>>,
            parameters: VertexParameters,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct VertexPrediction {
            text_embedding: Option<Vec<f32>>,
            image_embedding: Option<Vec<f32>>,
        }

        #[derive(Deserialize)]
        struct VertexResponse {
            predictions: Vec<VertexPrediction>,
        }

        let url = self.vertex_url()?;
        let token = self.config.api_key.as_deref().ok_or_else(|| {
            ShopRagError::ConfigError("embeddings.api_key (access token) is required".to_string())
        })?;
        debug!("Calling Vertex embeddings API: {}", url);

        let request = VertexRequest {
            instances: vec![VertexInstance {
                text,
                image: image.map(|bytes| VertexImage {
                    bytes_base64_encoded: BASE64.encode(bytes),
                }),
            }],
            parameters: VertexParameters {
                dimension: self.config.dimension,
            },
        };

        let response = self
            .retry
            .send("embeddings", || {
                self.client.post(&url).bearer_auth(token).json(&request)
            })
            .await?;

        let result: VertexResponse = response
            .json()
            .await
            .map_err(|e| ShopRagError::EmbeddingError(format!("Failed to parse response: {e}")))?;

        let prediction = result
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| ShopRagError::EmbeddingError("No prediction in response".to_string()))?;

        let embedding = if text.is_some() {
            prediction.text_embedding
        } else {
            prediction.image_embedding
        };
        embedding.ok_or_else(|| ShopRagError::EmbeddingError("No embedding in response".to_string()))
    }

    /// Generate embedding using `OpenAI` API
    async fn generate_openai(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.generate_batch_openai(&[text]).await?;
        batch
            .pop()
            .ok_or_else(|| ShopRagError::EmbeddingError("No embedding in response".to_string()))
    }

    /// Generate embeddings in batch using `OpenAI` API
    async fn generate_batch_openai(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ShopRagError::ConfigError("OpenAI API key not provided".to_string()))?;

        #[derive(Serialize)]
        struct OpenAIBatchRequest<'a> {
            input: &'a [&'a str],
            model: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            index: usize,
            embedding: Vec<f32>,
        }

        let url = format!("{}/embeddings", self.config.endpoint.trim_end_matches('/'));
        debug!("Calling OpenAI embeddings API: {} items", texts.len());

        let request = OpenAIBatchRequest {
            input: texts,
            model: &self.config.model,
        };

        let response = self
            .retry
            .send("embeddings", || {
                self.client.post(&url).bearer_auth(api_key).json(&request)
            })
            .await?;

        let mut result: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| ShopRagError::EmbeddingError(format!("Failed to parse response: {e}")))?;

        if result.data.len() != texts.len() {
            return Err(ShopRagError::EmbeddingError(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }
        result.data.sort_by_key(|d| d.index);
        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Generate embedding using Ollama API
    async fn generate_ollama(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct OllamaRequest<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.config.endpoint.trim_end_matches('/'));
        debug!("Calling Ollama embeddings API: {}", url);

        let request = OllamaRequest {
            model: &self.config.model,
            prompt: text,
        };

        let response = self
            .retry
            .send("embeddings", || self.client.post(&url).json(&request))
            .await?;

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ShopRagError::EmbeddingError(format!("Failed to parse response: {e}")))?;

        Ok(result.embedding)
    }
}
