//! Context assembly from retrieved products

use crate::embeddings::text_preprocessing::smart_truncate_text;
use crate::models::Product;
use crate::rag::SearchResult;

/// Longest product description copied into the context
const MAX_DESCRIPTION_CHARS: usize = 400;

/// Assembler for creating context from search results
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_context_length: usize,
}

impl ContextAssembler {
    /// Create a new context assembler bounded to `max_context_length` chars
    #[must_use]
    pub const fn new(max_context_length: usize) -> Self {
        Self { max_context_length }
    }

    /// Assemble context from search results, best first
    ///
    /// Stops at the first entry that would push the block past the bound.
    #[must_use]
    pub fn assemble(&self, results: &[SearchResult]) -> String {
        let mut context = String::new();
        let mut total_length = 0;

        for (idx, result) in results.iter().enumerate() {
            let entry = format!("[Product {}]\n{}\n\n", idx + 1, format_product(&result.product));
            let entry_length = entry.chars().count();

            if total_length + entry_length > self.max_context_length {
                break;
            }

            context.push_str(&entry);
            total_length += entry_length;
        }

        context.trim_end().to_string()
    }

    #[must_use]
    pub const fn max_context_length(&self) -> usize {
        self.max_context_length
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(4000)
    }
}

/// Format a single product for context
fn format_product(product: &Product) -> String {
    let mut parts = vec![format!("Name: {}", product.name)];

    if let Some(category) = &product.category {
        parts.push(format!("Category: {category}"));
    }
    if let Some(price) = product.price {
        let currency = product.currency.as_deref().unwrap_or("");
        parts.push(format!("Price: {price} {currency}").trim_end().to_string());
    }
    match product.stock_quantity {
        Some(0) => parts.push("Availability: out of stock".to_string()),
        Some(n) if n > 0 => parts.push(format!("Availability: {n} in stock")),
        _ => {}
    }
    if let Some(description) = product.description.as_deref().map(str::trim) {
        if !description.is_empty() {
            parts.push(format!(
                "Description: {}",
                smart_truncate_text(description, MAX_DESCRIPTION_CHARS)
            ));
        }
    }
    if let Some(image_url) = &product.image_url {
        parts.push(format!("Image: {image_url}"));
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;
    use crate::rag::MatchType;

    fn result(name: &str, description: Option<&str>) -> SearchResult {
        SearchResult {
            product: Product {
                id: Uuid::new_v4(),
                tenant_id: Uuid::nil(),
                name: name.to_string(),
                description: description.map(str::to_string),
                category: Some("Shoes".to_string()),
                price: Some(Decimal::new(129_000, 0)),
                currency: Some("VND".to_string()),
                stock_quantity: Some(0),
                image_url: None,
            },
            score: 0.5,
            match_type: MatchType::Hybrid,
        }
    }

    #[test]
    fn test_product_formatting() {
        let context = ContextAssembler::default().assemble(&[result("Red sneakers", Some("Canvas"))]);
        assert_eq!(
            context,
            "[Product 1]\nName: Red sneakers\nCategory: Shoes\nPrice: 129000 VND\nAvailability: out of stock\nDescription: Canvas"
        );
    }

    #[test]
    fn test_context_never_exceeds_bound() {
        let results: Vec<SearchResult> = (0..20)
            .map(|i| result(&format!("Product {i}"), Some(&"long text ".repeat(30))))
            .collect();
        let assembler = ContextAssembler::new(1000);

        let context = assembler.assemble(&results);
        assert!(context.chars().count() <= 1000);
        assert!(context.starts_with("[Product 1]"));
    }

    #[test]
    fn test_long_descriptions_are_truncated() {
        let long = "x".repeat(2000);
        let context = ContextAssembler::new(10_000).assemble(&[result("Item", Some(&long))]);
        assert!(context.chars().count() < 600);
    }

    #[test]
    fn test_empty_results_give_empty_context() {
        assert_eq!(ContextAssembler::default().assemble(&[]), "");
    }
}
