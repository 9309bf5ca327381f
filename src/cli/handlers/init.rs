//! Database initialization handler

use crate::cli::output::print_info;
use crate::cli::output::print_success;
use crate::cli::output::print_warning;
use crate::database::Database;
use crate::AppConfig;
use crate::Result;

/// Handle database initialization command
pub async fn handle_init_command(config: &AppConfig, force: bool) -> Result<()> {
    if !force {
        print_warning("This will create the pgvector extension, tables and indexes.");
        print_warning("This operation is safe - it uses CREATE IF NOT EXISTS.");
        println!("\nUse --force to proceed.");
        return Ok(());
    }

    print_info("Initializing shoprag database...");
    let database = Database::from_config(config).await?;
    database.init_schema(config.embedding_dimension()).await?;

    print_success(&format!(
        "Schema ready (products.embedding has {} dimensions)",
        config.embedding_dimension()
    ));
    Ok(())
}
