//! Text preprocessing utilities for embedding generation
//!
//! Cleans and bounds text before it is sent to an embedding provider.

use tracing::debug;
use tracing::warn;

use crate::errors::ShopRagError;

/// Longest input (in chars) sent to an embedding provider
pub const MAX_EMBEDDING_CHARS: usize = 1024;

/// Preprocess text for embedding generation
///
/// This function handles:
/// - Normalizing whitespace and newlines
/// - Removing control characters
/// - Truncating long text at a word boundary, never inside a character
pub fn preprocess_text_for_embedding(text: &str) -> Result<String, ShopRagError> {
    preprocess_with_limit(text, MAX_EMBEDDING_CHARS)
}

pub fn preprocess_with_limit(text: &str, max_chars: usize) -> Result<String, ShopRagError> {
    let sanitized = sanitize_text(&normalize_whitespace(text));

    if sanitized.is_empty() {
        return Err(ShopRagError::EmbeddingError(
            "Text is empty after preprocessing".to_string(),
        ));
    }

    let char_count = sanitized.chars().count();
    if char_count > max_chars {
        warn!("Text too long ({char_count} chars), truncating to {max_chars}");
        return Ok(smart_truncate_text(&sanitized, max_chars));
    }

    debug!("Preprocessed text: {} -> {} chars", text.len(), sanitized.len());
    Ok(sanitized)
}

/// Collapse every run of whitespace (newlines, tabs) to a single space
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Replace control characters with spaces, keep every other Unicode char
fn sanitize_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Truncate to at most `max_chars` characters, preferring a word boundary
/// when one is close to the cut
pub fn smart_truncate_text(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let truncated = &text[..cut];
    if let Some(last_space) = truncated.rfind(' ') {
        if last_space > cut * 3 / 4 {
            return truncated[..last_space].to_string();
        }
    }
    truncated.to_string()
}
