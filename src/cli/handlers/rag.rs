//! RAG question handler

use std::sync::Arc;

use uuid::Uuid;

use crate::cli::output::print_info;
use crate::cli::output::print_rag_answer;
use crate::database::Database;
use crate::rag::RagService;
use crate::AppConfig;
use crate::Result;

/// Run the orchestrator once, the way a channel message would be answered
pub async fn handle_ask_command(
    config: &AppConfig,
    question: &str,
    tenants: &[Uuid],
    context: Option<&str>,
) -> Result<()> {
    let database = Arc::new(Database::from_config(config).await?);
    let service = RagService::new(config, database)?;

    print_info(&format!("Asking {} tenant(s): {}", tenants.len(), question));
    let answer = service.answer(tenants, question, context).await;
    print_rag_answer(&answer);
    Ok(())
}
