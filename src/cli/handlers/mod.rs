//! CLI command handlers module
//!
//! Organized by functional domain:
//! - init: Database schema initialization
//! - serve: Webhook and API server
//! - rag: One-off RAG questions
//! - memory: Conversation memory maintenance
//! - channels: Telegram webhook and Messenger subscription management
//! - embeddings: Embedding diagnostics and product backfill

pub mod channels;
pub mod embeddings;
pub mod init;
pub mod memory;
pub mod rag;
pub mod serve;

pub use channels::*;
pub use embeddings::*;
pub use init::*;
pub use memory::*;
pub use rag::*;
pub use serve::*;
