//! Query enhancement: rewrite a raw customer message into a search query
//!
//! The rewrite is advisory. Whenever it is missing or looks wrong the
//! original text is used, so enhancement never fails and never loses the
//! customer's words.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::EnhancerConfig;
use crate::llm::ChatModel;
use crate::llm::GenerationParams;
use crate::llm::LlmMessage;
use crate::llm::ShopPrompts;
use crate::models::EnhancedQuery;

/// Extra room a rewrite gets when it may pull words from the conversation
const CONTEXT_ALLOWANCE_CHARS: usize = 80;

/// Rewrites of short messages may always use this many chars
const MIN_REWRITE_BUDGET: usize = 32;

pub struct QueryEnhancer {
    llm: Arc<dyn ChatModel>,
    config: EnhancerConfig,
    params: GenerationParams,
}

impl QueryEnhancer {
    /// `default_model` is used when `[enhancer].model` is not set
    #[must_use]
    pub fn new(llm: Arc<dyn ChatModel>, config: EnhancerConfig, default_model: &str) -> Self {
        let params = GenerationParams {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };
        Self {
            llm,
            config,
            params,
        }
    }

    /// Rewrite `raw` using optional recent conversation.
    ///
    /// Falls back to `optimized == original` when disabled, on any LLM error,
    /// or when the rewrite is rejected by [`QueryEnhancer::accept_rewrite`].
    pub async fn enhance(&self, raw: &str, context: Option<&str>) -> EnhancedQuery {
        let context = context.map(str::trim).filter(|c| !c.is_empty());

        if !self.config.enabled || raw.trim().is_empty() {
            return EnhancedQuery::unchanged(raw);
        }

        let prompt = ShopPrompts::query_rewrite().render(&HashMap::from([
            ("context", context.unwrap_or("(none)")),
            ("query", raw.trim()),
        ]));

        let rewrite = match self
            .llm
            .chat(&[LlmMessage::user(prompt)], &self.params)
            .await
        {
            Ok(text) => clean_rewrite(&text),
            Err(e) => {
                warn!("Query enhancement failed, using original query: {}", e);
                return EnhancedQuery::unchanged(raw);
            }
        };

        if !self.accept_rewrite(raw, &rewrite, context.is_some()) {
            debug!(original = %raw, rewrite = %rewrite, "Discarding query rewrite");
            return EnhancedQuery::unchanged(raw);
        }

        info!(original = %raw, optimized = %rewrite, "Query enhanced");
        EnhancedQuery {
            original: raw.to_string(),
            optimized: rewrite,
        }
    }

    /// Whether a cleaned rewrite may replace the original
    #[must_use]
    pub fn accept_rewrite(&self, original: &str, rewrite: &str, has_context: bool) -> bool {
        if rewrite.is_empty() {
            return false;
        }

        let original_len = original.trim().chars().count();
        let mut budget = (original_len * self.config.max_expansion).max(MIN_REWRITE_BUDGET);
        if has_context {
            budget += CONTEXT_ALLOWANCE_CHARS;
        }
        if rewrite.chars().count() > budget {
            return false;
        }

        // Without context every rewritten word must come from somewhere; a
        // rewrite sharing nothing with the message is a hallucination
        has_context || shares_word(original, rewrite)
    }
}

/// First non-empty line without labels, quotes or repeated whitespace
#[must_use]
pub fn clean_rewrite(text: &str) -> String {
    let Some(line) = text.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return String::new();
    };

    let mut line = line;
    for label in ["rewritten query:", "search query:", "query:"] {
        if line.len() >= label.len()
            && line.is_char_boundary(label.len())
            && line[..label.len()].eq_ignore_ascii_case(label)
        {
            line = line[label.len()..].trim_start();
            break;
        }
    }

    let line = line.trim_matches(|c| matches!(c, '"' | '\'' | '`' | '“' | '”' | '«' | '»'));
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn shares_word(a: &str, b: &str) -> bool {
    let a = words(a);
    words(b).iter().any(|w| a.contains(w))
}
