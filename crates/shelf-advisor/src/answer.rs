//! Query-answer composer
//!
//! Turns the products and categories found for a question into a short
//! natural-language answer. Without a provider, one of four templates is
//! chosen from the query wording and what was found.

use crate::advisor::Advisor;
use crate::prompts::{self, render};
use crate::provider::CompletionRequest;
use crate::structured::{complete_text, settle, Advice};
use serde_json::json;

const SAMPLE_SIZE: usize = 5;
const CATEGORY_LIST_SIZE: usize = 10;
const CATEGORY_WORDS: [&str; 3] = ["categories", "category", "types"];

/// What a question found
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnswerContext {
    /// Question as asked
    pub query: String,
    /// Store the question was scoped to
    pub store_id: String,
    /// Names of found products, in result order
    pub product_names: Vec<String>,
    /// Names of their categories, in first-reference order
    pub category_names: Vec<String>,
}

/// Template answer for `context`
#[must_use]
pub fn fallback_answer(context: &AnswerContext) -> String {
    let query = context.query.as_str();
    let lowered = query.to_lowercase();
    let asks_categories = CATEGORY_WORDS.iter().any(|w| lowered.contains(w));

    if asks_categories && !context.category_names.is_empty() {
        let names = join_first(&context.category_names, CATEGORY_LIST_SIZE);
        render(prompts::CATEGORIES_FROM_PRODUCTS, &[("categories", names.as_str())])
    } else if !context.product_names.is_empty() {
        let names = join_first(&context.product_names, SAMPLE_SIZE);
        let count = context.product_names.len().to_string();
        render(
            prompts::PRODUCTS_FOUND,
            &[("count", count.as_str()), ("products", names.as_str()), ("query", query)],
        )
    } else if !context.category_names.is_empty() {
        let names = join_first(&context.category_names, SAMPLE_SIZE);
        let count = context.category_names.len().to_string();
        render(
            prompts::CATEGORIES_FOUND,
            &[("count", count.as_str()), ("categories", names.as_str()), ("query", query)],
        )
    } else {
        render(prompts::NO_RESULTS, &[("query", query)])
    }
}

fn join_first(names: &[String], n: usize) -> String {
    names.iter().take(n).map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl Advisor {
    /// Compose an answer to a store question
    pub async fn compose_answer(&self, context: &AnswerContext) -> Advice<String> {
        let sample = json!({
            "sample_products": context.product_names.iter().take(SAMPLE_SIZE).collect::<Vec<_>>(),
            "sample_categories": context.category_names.iter().take(SAMPLE_SIZE).collect::<Vec<_>>(),
        });
        let request = CompletionRequest::new(
            prompts::ASSISTANT_SYSTEM,
            prompts::answer_prompt(
                &context.query,
                &context.store_id,
                context.product_names.len(),
                context.category_names.len(),
                &sample,
            ),
        )
        .with_max_tokens(200)
        .with_temperature(0.7);

        let result = complete_text(&self.provider, &request, self.timeout).await;
        settle("compose_answer", result, || fallback_answer(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn context(query: &str, products: &[&str], categories: &[&str]) -> AnswerContext {
        AnswerContext {
            query: query.to_string(),
            store_id: "64b7f0c2a1b2c3d4e5f60718".to_string(),
            product_names: products.iter().map(ToString::to_string).collect(),
            category_names: categories.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn category_question_lists_categories() {
        let answer = fallback_answer(&context("What Categories do I have?", &["Milk"], &["Dairy", "Bakery"]));
        assert_eq!(
            answer,
            "Based on your available products, here are the categories in your store: Dairy, Bakery. These represent the main product groups your customers can find."
        );
    }

    #[test]
    fn products_listed_up_to_five() {
        let names = ["A", "B", "C", "D", "E", "F"];
        let answer = fallback_answer(&context("cheap snacks", &names, &[]));
        assert_eq!(
            answer,
            "Found 6 products for 'cheap snacks'. Top results: A, B, C, D, E. Would you like more details?"
        );
    }

    #[test]
    fn categories_without_products() {
        let answer = fallback_answer(&context("snacks", &[], &["Snacks"]));
        assert!(answer.starts_with("Found 1 categories for 'snacks': Snacks."));
    }

    #[test]
    fn nothing_found() {
        let answer = fallback_answer(&context("unicorn milk", &[], &[]));
        assert!(answer.starts_with("I couldn't find specific results for 'unicorn milk'."));
    }

    #[tokio::test]
    async fn unavailable_provider_uses_template() {
        let ctx = context("types of rice", &["Basmati"], &["Grains"]);
        let advice = Advisor::unavailable().compose_answer(&ctx).await;
        assert!(advice.is_fallback());
        assert_eq!(advice.value, fallback_answer(&ctx));
    }
}
