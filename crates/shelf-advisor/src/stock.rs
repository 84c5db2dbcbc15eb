//! Per-product stock advice

use crate::advisor::Advisor;
use crate::error::{AdvisorError, AdvisorResult};
use crate::prompts;
use crate::provider::CompletionRequest;
use crate::structured::{complete_json, settle, Advice};
use serde::{Deserialize, Serialize};

/// Product fields a stock recommendation is based on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    /// Display name
    pub product_name: String,
    /// List price
    pub mrp_price: f64,
    /// Selling price
    pub offer_price: f64,
    /// Point-of-sale price, when set
    pub pos_price: Option<f64>,
    /// Units on hand
    pub stock_quantity: i64,
}

/// One action with its reasoning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecommendation {
    /// Recommended action
    pub recommendation: String,
    /// Short rationale
    pub reasoning: String,
}

impl StockRecommendation {
    /// Fixed answer used when no recommendation could be generated
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            recommendation: "Unable to generate recommendation.".to_string(),
            reasoning: "No valid recommendation was produced for this product.".to_string(),
        }
    }
}

fn validate(reco: StockRecommendation) -> AdvisorResult<StockRecommendation> {
    if reco.recommendation.trim().is_empty() {
        return Err(AdvisorError::shape("empty recommendation"));
    }
    Ok(reco)
}

impl Advisor {
    /// Recommend one action for a stocked product
    pub async fn recommend_stock_action(&self, item: &StockSnapshot) -> Advice<StockRecommendation> {
        let request = CompletionRequest::new(
            prompts::STOCK_SYSTEM,
            prompts::stock_prompt(
                &item.product_name,
                item.mrp_price,
                item.offer_price,
                item.pos_price,
                item.stock_quantity,
            ),
        )
        .with_max_tokens(200)
        .with_temperature(0.2)
        .json();

        let result = complete_json(&self.provider, &request, self.timeout, validate).await;
        settle("recommend_stock_action", result, StockRecommendation::unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockTextProvider, ProviderHandle};
    use pretty_assertions::assert_eq;

    fn item() -> StockSnapshot {
        StockSnapshot {
            product_name: "Basmati Rice 5kg".into(),
            mrp_price: 650.0,
            offer_price: 599.0,
            pos_price: Some(610.0),
            stock_quantity: 240,
        }
    }

    #[tokio::test]
    async fn requests_json_mode() {
        let mut mock = MockTextProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_complete()
            .withf(|request| request.json_mode && request.prompt.contains("Basmati Rice 5kg"))
            .returning(|_| {
                Ok(r#"{"recommendation": "Run a 10% weekend offer", "reasoning": "High stock"}"#.into())
            });
        let advice = Advisor::new(ProviderHandle::available(mock))
            .recommend_stock_action(&item())
            .await;
        assert_eq!(advice.value.recommendation, "Run a 10% weekend offer");
    }

    #[tokio::test]
    async fn missing_key_falls_back() {
        let mut mock = MockTextProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_complete()
            .returning(|_| Ok(r#"{"recommendation": "x"}"#.into()));
        let advice = Advisor::new(ProviderHandle::available(mock))
            .recommend_stock_action(&item())
            .await;
        assert!(advice.is_fallback());
        assert_eq!(advice.value, StockRecommendation::unavailable());
    }
}
