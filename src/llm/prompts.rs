//! Prompt templates for the shop assistant

use std::collections::HashMap;

/// Template with `{{variable}}` placeholders
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    variables: Vec<String>,
}

impl PromptTemplate {
    /// Create a new prompt template
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let variables = extract_variables(&template);
        Self {
            template,
            variables,
        }
    }

    /// Fill in the template with variables
    #[must_use]
    pub fn render(&self, values: &HashMap<&str, &str>) -> String {
        let mut result = self.template.clone();
        for var in &self.variables {
            if let Some(value) = values.get(var.as_str()) {
                result = result.replace(&format!("{{{{{var}}}}}"), value);
            }
        }
        result
    }

    /// Get required variables
    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

/// Extract variable names from template
fn extract_variables(template: &str) -> Vec<String> {
    let mut variables = Vec::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '{' && chars.peek() == Some(&'{') {
            chars.next(); // skip second '{'
            let mut var_name = String::new();
            while let Some(&ch) = chars.peek() {
                if ch == '}' {
                    chars.next();
                    if chars.peek() == Some(&'}') {
                        chars.next();
                        break;
                    }
                } else {
                    var_name.push(ch);
                    chars.next();
                }
            }
            if !var_name.is_empty() && !variables.contains(&var_name) {
                variables.push(var_name);
            }
        }
    }

    variables
}

/// Standard prompts used by the pipeline
pub struct ShopPrompts;

impl ShopPrompts {
    /// Rewrites a raw customer message into a catalog search query
    #[must_use]
    pub fn query_rewrite() -> PromptTemplate {
        PromptTemplate::new(
            r"You rewrite customer messages into short product search queries for an online shop.

Recent conversation (may be empty):
{{context}}

Customer message: {{query}}

Rules:
1. Keep every product name, brand, size, color and number from the message
2. Fix obvious typos and transliteration, resolve references like 'it' or 'that one' from the conversation
3. Use the same language as the customer
4. Do not answer the question and do not add products that were not mentioned

Return only the rewritten query on a single line.",
        )
    }

    /// System prompt for answering from catalog context
    #[must_use]
    pub fn shop_assistant() -> PromptTemplate {
        PromptTemplate::new(
            r"You are a friendly sales assistant chatting with a customer of an online shop.

Catalog information relevant to the question:
{{context}}

Recent conversation:
{{conversation}}

Instructions:
1. Answer only from the catalog information above; never invent products, prices or stock
2. Mention product names and prices when they help the customer
3. If the catalog information does not answer the question, say so and offer to help with something else
4. Reply in the customer's language, briefly, as a chat message without markdown tables",
        )
    }
}

/// Placeholder context when retrieval found nothing
pub const NO_CATALOG_MATCHES: &str =
    "(no matching catalog information was found for this question)";

/// Placeholder when there is no previous conversation
pub const NO_CONVERSATION: &str = "(this is the start of the conversation)";
