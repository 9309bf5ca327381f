//! LLM client for OpenAI compatible chat completion endpoints
//!
//! Used twice per question: once by the query enhancer to rewrite the
//! customer's message and once by the completer to write the answer.

pub mod prompts;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

pub use prompts::PromptTemplate;
pub use prompts::ShopPrompts;

use crate::config::AppConfig;
use crate::errors::Result;
use crate::errors::ShopRagError;
use crate::retry::build_http_client;
use crate::retry::RetryPolicy;

/// One message of a chat completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Per-call sampling parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Chat completion backend
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion and return the assistant text (may be empty)
    async fn chat(&self, messages: &[LlmMessage], params: &GenerationParams) -> Result<String>;
}

/// HTTP client for `{endpoint}/chat/completions`
pub struct LlmService {
    client: Client,
    endpoint: String,
    api_key: String,
    retry: RetryPolicy,
}

impl LlmService {
    /// Create a new LLM service from the `[llm]` and `[http]` sections
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self::with_client(
            build_http_client(&config.http)?,
            config.llm_endpoint(),
            &config.llm.llm_key,
            RetryPolicy::from_config(&config.http),
        ))
    }

    #[must_use]
    pub fn with_client(client: Client, endpoint: &str, api_key: &str, retry: RetryPolicy) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            retry,
        }
    }

    /// Single-prompt convenience wrapper around [`ChatModel::chat`]
    pub async fn generate_with_params(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String> {
        let params = GenerationParams {
            model: model.to_string(),
            temperature,
            max_tokens,
        };
        self.chat(&[LlmMessage::user(prompt)], &params).await
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    temperature: f32,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatModel for LlmService {
    async fn chat(&self, messages: &[LlmMessage], params: &GenerationParams) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        debug!(model = %params.model, messages = messages.len(), "Calling chat completions API");

        let request = ChatCompletionRequest {
            model: &params.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .retry
            .send("llm", || {
                let builder = self.client.post(&url).json(&request);
                if self.api_key.is_empty() {
                    builder
                } else {
                    builder.bearer_auth(&self.api_key)
                }
            })
            .await?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ShopRagError::LlmError(format!("Failed to parse response: {e}")))?;

        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}
