//! shoprag: multi-tenant RAG chatbot backend
//!
//! Customers write to a shop's Facebook page or Telegram bot; the service
//! logs the message, answers it from the owning tenant's product catalog
//! through a retrieval-augmented generation pipeline and replies on the same
//! channel.

pub mod api;
pub mod channels;
pub mod cli;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod memory;
pub mod models;
pub mod rag;
pub mod rate_limit;
pub mod retry;

#[cfg(test)]
mod models_tests;

pub use config::AppConfig;
pub use errors::*;
