use async_trait::async_trait;
use pgvector::Vector;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::Database;
use crate::models::Product;
use crate::models::ScoredProduct;
use crate::rag::CatalogSearch;
use crate::Result;

#[derive(sqlx::FromRow)]
struct RawProduct {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    description: Option<String>,
    category: Option<String>,
    price: Option<Decimal>,
    currency: Option<String>,
    stock_quantity: Option<i32>,
    image_url: Option<String>,
}

impl From<RawProduct> for Product {
    fn from(row: RawProduct) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            description: row.description,
            category: row.category,
            price: row.price,
            currency: row.currency,
            stock_quantity: row.stock_quantity,
            image_url: row.image_url,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RawScoredProduct {
    #[sqlx(flatten)]
    product: RawProduct,
    score: f64,
}

impl From<RawScoredProduct> for ScoredProduct {
    fn from(row: RawScoredProduct) -> Self {
        Self {
            product: row.product.into(),
            score: row.score as f32,
        }
    }
}

/// `%term%` with LIKE wildcards in the term escaped
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl CatalogSearch for Database {
    async fn semantic_search(
        &self,
        tenant_ids: &[Uuid],
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredProduct>> {
        if tenant_ids.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, RawScoredProduct>(
            r"
            SELECT
                id, tenant_id, name, description, category, price, currency,
                stock_quantity, image_url,
                1 - (embedding <=> $2) AS score
            FROM products
            WHERE tenant_id = ANY($1)
              AND embedding IS NOT NULL
            ORDER BY embedding <=> $2, id
            LIMIT $3
            ",
        )
        .bind(tenant_ids)
        .bind(Vector::from(embedding.to_vec()))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ScoredProduct::from).collect())
    }

    async fn keyword_search(
        &self,
        tenant_ids: &[Uuid],
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<ScoredProduct>> {
        if tenant_ids.is_empty() || terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let patterns: Vec<String> = terms.iter().map(|t| contains_pattern(t)).collect();
        let rows = sqlx::query_as::<_, RawScoredProduct>(
            r"
            SELECT
                p.id, p.tenant_id, p.name, p.description, p.category, p.price,
                p.currency, p.stock_quantity, p.image_url,
                (
                    SELECT COUNT(*)
                    FROM unnest($2::text[]) AS t(pattern)
                    WHERE p.name ILIKE t.pattern
                       OR p.description ILIKE t.pattern
                       OR p.category ILIKE t.pattern
                )::float8 / $3::float8 AS score
            FROM products p
            WHERE p.tenant_id = ANY($1)
              AND (
                  p.name ILIKE ANY($2)
                  OR p.description ILIKE ANY($2)
                  OR p.category ILIKE ANY($2)
              )
            ORDER BY score DESC, p.id
            LIMIT $4
            ",
        )
        .bind(tenant_ids)
        .bind(&patterns)
        .bind(patterns.len() as f64)
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ScoredProduct::from).collect())
    }
}

impl Database {
    /// Products that still need an embedding, oldest first
    pub async fn products_without_embeddings(
        &self,
        tenant_id: Option<Uuid>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, RawProduct>(
            r"
            SELECT id, tenant_id, name, description, category, price, currency,
                   stock_quantity, image_url
            FROM products
            WHERE embedding IS NULL
              AND ($1::uuid IS NULL OR tenant_id = $1)
            ORDER BY created_at, id
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(tenant_id)
        .bind(limit_param(limit))
        .bind(limit_param(offset))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Count products without embeddings
    pub async fn count_products_without_embeddings(&self, tenant_id: Option<Uuid>) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM products WHERE embedding IS NULL AND ($1::uuid IS NULL OR tenant_id = $1)",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn store_product_embedding(&self, product_id: Uuid, embedding: &[f32]) -> Result<()> {
        sqlx::query("UPDATE products SET embedding = $2, updated_at = NOW() WHERE id = $1")
            .bind(product_id)
            .bind(Vector::from(embedding.to_vec()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
