//! Conversation memory handler

use uuid::Uuid;

use crate::cli::output::print_success;
use crate::database::Database;
use crate::memory::MemoryStore;
use crate::AppConfig;
use crate::Result;

pub async fn handle_memory_clear(config: &AppConfig, owner_id: Uuid) -> Result<()> {
    let database = Database::from_config(config).await?;
    let removed = database.clear_memory(owner_id).await?;
    print_success(&format!("Removed {removed} rows of conversation memory for {owner_id}"));
    Ok(())
}
