//! Embedding diagnostics and backfill handlers

use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use crate::cli::output::print_embedding;
use crate::cli::output::print_info;
use crate::cli::output::print_success;
use crate::cli::output::print_warning;
use crate::cli::output::truncate_str;
use crate::database::Database;
use crate::embeddings::backfill_product_embeddings;
use crate::embeddings::EmbeddingService;
use crate::AppConfig;
use crate::Result;
use crate::ShopRagError;

/// Embed text and/or an image and check the vector against the configuration
pub async fn handle_embed_command(
    config: &AppConfig,
    text: Option<&str>,
    image: Option<&Path>,
) -> Result<()> {
    if text.is_none() && image.is_none() {
        return Err(ShopRagError::InvalidInput(
            "provide --text, --image or both".to_string(),
        ));
    }

    let image_bytes = match image {
        Some(path) => Some(tokio::fs::read(path).await?),
        None => None,
    };
    if let Some(text) = text {
        print_info(&format!("Text: {}", truncate_str(text, 80)));
    }
    if let (Some(path), Some(bytes)) = (image, &image_bytes) {
        print_info(&format!("Image: {} ({} bytes)", path.display(), bytes.len()));
    }

    let service = EmbeddingService::new(config)?;
    let embedding = service
        .embed_multimodal(text, image_bytes.as_deref())
        .await?;
    print_embedding(&embedding, service.dimension());
    Ok(())
}

pub async fn handle_backfill_command(
    config: &AppConfig,
    tenant: Option<Uuid>,
    batch_size: usize,
) -> Result<()> {
    let database = Arc::new(Database::from_config(config).await?);
    let service = Arc::new(EmbeddingService::new(config)?);

    print_info(&format!(
        "Backfilling product embeddings{}",
        tenant.map(|t| format!(" for tenant {t}")).unwrap_or_default()
    ));
    let stats = backfill_product_embeddings(database, service, tenant, batch_size).await?;

    if stats.failed > 0 {
        print_warning(&format!("{} products failed; rerun to retry them", stats.failed));
    }
    print_success(&format!(
        "{} of {} products embedded ({:.1}%)",
        stats.updated,
        stats.total_products,
        stats.success_rate()
    ));
    Ok(())
}
