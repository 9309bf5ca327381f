//! Backfill embeddings for catalog products

use std::sync::Arc;

use tracing::info;
use tracing::warn;
use uuid::Uuid;

use super::generator::EmbeddingService;
use crate::database::Database;
use crate::errors::Result;
use crate::models::Product;

/// Backfill statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackfillStats {
    pub total_products: usize,
    pub updated: usize,
    pub failed: usize,
}

impl BackfillStats {
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_products == 0 {
            0.0
        } else {
            (self.updated as f64 / self.total_products as f64) * 100.0
        }
    }
}

/// Embed every product that has no embedding yet, optionally for one tenant
///
/// Products that fail stay without embedding and are skipped on later
/// batches of the same run.
pub async fn backfill_product_embeddings(
    db: Arc<Database>,
    embedding_service: Arc<EmbeddingService>,
    tenant_id: Option<Uuid>,
    batch_size: usize,
) -> Result<BackfillStats> {
    let batch_size = batch_size.clamp(1, super::MAX_BATCH_SIZE);
    let pending = db.count_products_without_embeddings(tenant_id).await?;
    info!("Starting product embeddings backfill: {} products pending", pending);

    let mut stats = BackfillStats::default();
    let mut batch_idx = 0usize;

    loop {
        // Failed products keep their position at the front of the queue
        let products = db
            .products_without_embeddings(tenant_id, batch_size, stats.failed)
            .await?;
        if products.is_empty() {
            break;
        }
        batch_idx += 1;
        stats.total_products += products.len();
        info!("Processing batch {} ({} products)", batch_idx, products.len());

        for (product, embedding) in embed_products(&embedding_service, &products).await {
            let stored = match embedding {
                Ok(embedding) => db.store_product_embedding(product.id, &embedding).await,
                Err(e) => Err(e),
            };
            match stored {
                Ok(()) => stats.updated += 1,
                Err(e) => {
                    warn!("Failed to embed product {} ({}): {}", product.id, product.name, e);
                    stats.failed += 1;
                }
            }
        }

        // Small delay between batches to avoid rate limiting
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }

    info!(
        "Backfill complete: {} updated, {} failed ({:.1}% success)",
        stats.updated,
        stats.failed,
        stats.success_rate()
    );
    Ok(stats)
}

/// Embed a batch in one call, falling back to one call per product when the
/// batch request fails
async fn embed_products<'a>(
    service: &EmbeddingService,
    products: &'a [Product],
) -> Vec<(&'a Product, Result<Vec<f32>>)> {
    let texts: Vec<String> = products.iter().map(Product::embedding_text).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

    match service.embed_batch(&refs).await {
        Ok(embeddings) if embeddings.len() == products.len() => {
            products.iter().zip(embeddings.into_iter().map(Ok)).collect()
        }
        Ok(embeddings) => {
            warn!(
                "Batch returned {} embeddings for {} products, retrying one by one",
                embeddings.len(),
                products.len()
            );
            embed_one_by_one(service, products, &texts).await
        }
        Err(e) => {
            warn!("Batch embedding failed, retrying one by one: {}", e);
            embed_one_by_one(service, products, &texts).await
        }
    }
}

async fn embed_one_by_one<'a>(
    service: &EmbeddingService,
    products: &'a [Product],
    texts: &[String],
) -> Vec<(&'a Product, Result<Vec<f32>>)> {
    let mut results = Vec::with_capacity(products.len());
    for (product, text) in products.iter().zip(texts) {
        results.push((product, service.embed(text).await));
    }
    results
}
