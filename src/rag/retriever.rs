//! Retrieval module for tenant-scoped hybrid search

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use tracing::warn;
use uuid::Uuid;

use crate::config::RagConfig;
use crate::errors::Result;
use crate::errors::ShopRagError;
use crate::models::Product;
use crate::models::ScoredProduct;
use crate::rag::CatalogSearch;
use crate::rag::MatchType;
use crate::rag::SearchResult;

/// Most keyword terms taken from one query
const MAX_TERMS: usize = 12;

/// Each signal fetches this many times the final limit before fusion
const CANDIDATE_FACTOR: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct RetrieverConfig {
    pub limit: usize,
    pub rrf_k: f32,
    pub semantic_weight: f32,
    pub keyword_weight: f32,
}

impl RetrieverConfig {
    #[must_use]
    pub fn from_rag_config(config: &RagConfig) -> Self {
        Self {
            limit: config.retrieval_limit,
            rrf_k: config.rrf_k,
            semantic_weight: config.semantic_weight,
            keyword_weight: config.keyword_weight,
        }
    }
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self::from_rag_config(&RagConfig::default())
    }
}

/// Retriever for semantic and hybrid search
#[derive(Clone)]
pub struct Retriever {
    catalog: Arc<dyn CatalogSearch>,
    config: RetrieverConfig,
}

impl Retriever {
    /// Create a new retriever
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogSearch>, config: RetrieverConfig) -> Self {
        Self { catalog, config }
    }

    /// Hybrid search restricted to `tenant_ids`
    ///
    /// Without an embedding the search is keyword-only. Results are sorted by
    /// descending score, ties by ascending product id.
    ///
    /// # Errors
    /// - `InvalidInput` when `tenant_ids` is empty
    /// - Data access errors from the catalog
    pub async fn search(
        &self,
        tenant_ids: &[Uuid],
        query_embedding: Option<&[f32]>,
        query_text: &str,
    ) -> Result<Vec<SearchResult>> {
        if tenant_ids.is_empty() {
            return Err(ShopRagError::InvalidInput(
                "retrieval requires at least one tenant".to_string(),
            ));
        }

        let terms = extract_terms(query_text);
        let candidates = self.config.limit.saturating_mul(CANDIDATE_FACTOR);
        debug!(
            tenants = tenant_ids.len(),
            terms = terms.len(),
            semantic = query_embedding.is_some(),
            "Performing hybrid search: {}",
            query_text
        );

        let semantic = async {
            match query_embedding {
                Some(embedding) => {
                    self.catalog
                        .semantic_search(tenant_ids, embedding, candidates)
                        .await
                }
                None => Ok(Vec::new()),
            }
        };
        let keyword = async {
            if terms.is_empty() {
                Ok(Vec::new())
            } else {
                self.catalog
                    .keyword_search(tenant_ids, &terms, candidates)
                    .await
            }
        };
        let (semantic, keyword) = tokio::try_join!(semantic, keyword)?;

        let semantic = retain_tenants(semantic, tenant_ids, "semantic");
        let keyword = retain_tenants(keyword, tenant_ids, "keyword");
        debug!(
            "Retrieved {} semantic and {} keyword candidates",
            semantic.len(),
            keyword.len()
        );

        let mut results = Reranker::reciprocal_rank_fusion(
            vec![
                (semantic, MatchType::Semantic, self.config.semantic_weight),
                (keyword, MatchType::Keyword, self.config.keyword_weight),
            ],
            self.config.rrf_k,
        );
        results.truncate(self.config.limit);
        Ok(results)
    }

    #[must_use]
    pub const fn config(&self) -> &RetrieverConfig {
        &self.config
    }
}

/// Drop rows from tenants outside the requested set
fn retain_tenants(
    rows: Vec<ScoredProduct>,
    tenant_ids: &[Uuid],
    source: &'static str,
) -> Vec<ScoredProduct> {
    rows.into_iter()
        .filter(|row| {
            let allowed = tenant_ids.contains(&row.product.tenant_id);
            if !allowed {
                warn!(
                    product_id = %row.product.id,
                    tenant_id = %row.product.tenant_id,
                    source,
                    "Catalog returned a product outside the requested tenants; dropping it"
                );
            }
            allowed
        })
        .collect()
}

/// Lowercased, deduplicated search terms of at least two characters
#[must_use]
pub fn extract_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() < 2 {
            continue;
        }
        let term = word.to_lowercase();
        if !terms.contains(&term) {
            terms.push(term);
        }
        if terms.len() == MAX_TERMS {
            break;
        }
    }
    terms
}

/// Rerank search results
pub struct Reranker;

impl Reranker {
    /// Weighted Reciprocal Rank Fusion (RRF) for combining ranked lists
    ///
    /// Each list contributes `weight / (k + rank + 1)`. Products found in more
    /// than one list become [`MatchType::Hybrid`].
    #[must_use]
    pub fn reciprocal_rank_fusion(
        result_sets: Vec<(Vec<ScoredProduct>, MatchType, f32)>,
        k: f32,
    ) -> Vec<SearchResult> {
        let mut scores: HashMap<Uuid, (f32, Product, MatchType)> = HashMap::new();

        for (results, match_type, weight) in result_sets {
            for (rank, result) in results.into_iter().enumerate() {
                let rrf_score = weight / (k + rank as f32 + 1.0);
                let entry = scores
                    .entry(result.product.id)
                    .or_insert((0.0, result.product, match_type));
                if entry.2 != match_type {
                    entry.2 = MatchType::Hybrid;
                }
                entry.0 += rrf_score;
            }
        }

        let mut final_results: Vec<SearchResult> = scores
            .into_values()
            .map(|(score, product, match_type)| SearchResult {
                product,
                score,
                match_type,
            })
            .collect();

        Self::sort_results(&mut final_results);
        final_results
    }

    /// Descending score, then ascending product id
    pub fn sort_results(results: &mut [SearchResult]) {
        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.product.id.cmp(&b.product.id))
        });
    }
}
