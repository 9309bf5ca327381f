//! CLI output formatting utilities

use crate::rag::RagAnswer;

/// Safely truncate a string at character boundary (not byte boundary)
///
/// Returns the string with a "..." suffix if truncated.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Print a RAG answer with how it was produced
pub fn print_rag_answer(answer: &RagAnswer) {
    println!("💬 {}", answer.reply);
    println!();
    if answer.query.was_rewritten() {
        println!("🔎 Search query: {}", answer.query.optimized);
    }
    if answer.degraded {
        print_warning("Embedding failed; keyword search only");
    }
    if answer.failed {
        print_error("Pipeline failed; the apology message was returned");
    }
}

/// Print an embedding summary
pub fn print_embedding(embedding: &[f32], expected_dimension: usize) {
    let preview: Vec<String> = embedding.iter().take(8).map(|v| format!("{v:.4}")).collect();
    println!("📐 Dimension: {} (configured {})", embedding.len(), expected_dimension);
    println!("🔢 Preview: [{}{}]", preview.join(", "), if embedding.len() > 8 { ", ..." } else { "" });
}

pub fn print_info(msg: &str) {
    println!("ℹ️  {msg}");
}

pub fn print_success(msg: &str) {
    println!("✅ {msg}");
}

pub fn print_warning(msg: &str) {
    println!("⚠️  {msg}");
}

pub fn print_error(msg: &str) {
    println!("❌ {msg}");
}
