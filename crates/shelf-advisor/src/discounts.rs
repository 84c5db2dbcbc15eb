//! Discount-strategy flow

use crate::advisor::Advisor;
use crate::error::{AdvisorError, AdvisorResult};
use crate::prompts;
use crate::provider::CompletionRequest;
use crate::structured::{complete_json, settle, Advice};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Age in days past which a product counts as old stock
pub const OLD_STOCK_DAYS: i64 = 30;

/// Aged products considered when describing inventory to the provider
const PROMPT_SAMPLE: usize = 10;

/// Store performance figures the strategy is based on
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    /// Completed share of orders, percent
    pub completion_rate: f64,
    /// Orders in the period
    pub total_orders: u64,
    /// Revenue in the period
    pub total_revenue: f64,
}

/// Inputs for a discount strategy
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiscountContext {
    /// Store performance
    pub performance: PerformanceSnapshot,
    /// `days_in_inventory` of each unsold product, oldest first
    pub days_in_inventory: Vec<i64>,
}

impl DiscountContext {
    /// Products aged over [`OLD_STOCK_DAYS`]
    #[must_use]
    pub fn old_count(&self) -> usize {
        count_old(&self.days_in_inventory)
    }
}

fn count_old(days: &[i64]) -> usize {
    days.iter().filter(|d| **d > OLD_STOCK_DAYS).count()
}

/// One categorized discount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountSuggestion {
    /// Product group
    pub category: String,
    /// Discount range, e.g. `20-30%`
    pub discount: String,
    /// Rationale
    pub reason: String,
}

impl DiscountSuggestion {
    fn new(category: &str, discount: &str, reason: &str) -> Self {
        Self {
            category: category.to_string(),
            discount: discount.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Discount strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountStrategy {
    /// Overall approach
    pub strategy: String,
    /// Ordered quick actions
    pub quick_actions: Vec<String>,
    /// Categorized discounts
    #[serde(default)]
    pub discount_suggestions: Vec<DiscountSuggestion>,
}

/// Fixed-template strategy parameterized by the old-stock count
#[must_use]
pub fn fallback_strategy(old_count: usize) -> DiscountStrategy {
    DiscountStrategy {
        strategy: "Clear old inventory with targeted discounts while maintaining margins".to_string(),
        quick_actions: vec![
            format!("Apply 20-30% discount to {old_count} products over 30 days old"),
            "Create bundle deals with popular items".to_string(),
            "Run limited-time promotions".to_string(),
        ],
        discount_suggestions: vec![
            DiscountSuggestion::new("30+ days old", "20-30%", "Clear aging inventory"),
            DiscountSuggestion::new("slow movers", "10-15%", "Improve cash flow"),
            DiscountSuggestion::new("popular items", "5-10%", "Drive traffic"),
        ],
    }
}

fn validate(strategy: DiscountStrategy) -> AdvisorResult<DiscountStrategy> {
    if strategy.strategy.trim().is_empty() {
        return Err(AdvisorError::shape("empty strategy"));
    }
    if strategy.quick_actions.is_empty() {
        return Err(AdvisorError::shape("no quick actions"));
    }
    Ok(strategy)
}

impl Advisor {
    /// Recommend a discount strategy
    pub async fn recommend_discounts(&self, context: &DiscountContext) -> Advice<DiscountStrategy> {
        let performance = json!({
            "completion_rate": context.performance.completion_rate,
            "total_orders": context.performance.total_orders,
            "revenue": context.performance.total_revenue,
        });
        let sampled = &context.days_in_inventory[..context.days_in_inventory.len().min(PROMPT_SAMPLE)];
        let request = CompletionRequest::new(
            prompts::DISCOUNT_SYSTEM,
            prompts::discount_prompt(&performance, count_old(sampled)),
        )
        .with_max_tokens(500)
        .with_temperature(0.4);

        let result = complete_json(&self.provider, &request, self.timeout, validate).await;
        settle("recommend_discounts", result, || fallback_strategy(context.old_count()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockTextProvider, ProviderHandle};
    use pretty_assertions::assert_eq;

    fn context(days: Vec<i64>) -> DiscountContext {
        DiscountContext {
            performance: PerformanceSnapshot {
                completion_rate: 70.0,
                total_orders: 10,
                total_revenue: 1500.0,
            },
            days_in_inventory: days,
        }
    }

    #[test]
    fn counts_strictly_over_thirty() {
        assert_eq!(context(vec![30, 31, 90, 2]).old_count(), 2);
    }

    #[tokio::test]
    async fn unavailable_uses_template() {
        let days: Vec<i64> = (0..14).map(|i| 25 + i * 5).collect();
        let ctx = context(days);
        let advice = Advisor::unavailable().recommend_discounts(&ctx).await;
        assert!(advice.is_fallback());
        assert_eq!(advice.value, fallback_strategy(ctx.old_count()));
        assert_eq!(
            advice.value.quick_actions[0],
            "Apply 20-30% discount to 12 products over 30 days old"
        );
    }

    #[tokio::test]
    async fn prompt_counts_first_ten_only() {
        let mut mock = MockTextProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_complete()
            .withf(|request| request.prompt.contains("Inventory Issues: 8 products over 30 days old"))
            .returning(|_| {
                Ok(r#"{"strategy": "Bundle slow stock", "quick_actions": ["Bundle"], "discount_suggestions": []}"#.to_string())
            });
        let advisor = Advisor::new(ProviderHandle::available(mock));
        let days: Vec<i64> = (0..14).map(|i| 25 + i * 5).collect();

        let advice = advisor.recommend_discounts(&context(days)).await;
        assert!(!advice.is_fallback());
        assert_eq!(advice.value.strategy, "Bundle slow stock");
    }

    #[tokio::test]
    async fn empty_actions_fall_back() {
        let mut mock = MockTextProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_complete()
            .returning(|_| Ok(r#"{"strategy": "x", "quick_actions": []}"#.to_string()));
        let advisor = Advisor::new(ProviderHandle::available(mock));
        let advice = advisor.recommend_discounts(&context(vec![45])).await;
        assert_eq!(advice.value, fallback_strategy(1));
    }
}
