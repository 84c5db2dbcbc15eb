//! Substitution flow
//!
//! Ranks same-category alternatives for a product. Provider output is
//! accepted only when every entry names a candidate that was shown to the
//! provider and carries a finite score in `[0, 1]`.

use crate::advisor::{round2, Advisor};
use crate::error::{AdvisorError, AdvisorResult};
use crate::prompts;
use crate::provider::CompletionRequest;
use crate::structured::{complete_json, settle, Advice};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;

/// Candidates shown to the provider
pub const SHOWN_CANDIDATES: usize = 10;

/// Reason attached to fallback substitutes
pub const FALLBACK_REASON: &str = "Similar product in same category";

/// Product fields the substitution flow needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductBrief {
    /// Product identifier, hex
    pub product_id: String,
    /// Display name
    pub product_name: String,
    /// Selling price
    pub offer_price: f64,
    /// Category name, when known
    pub category: Option<String>,
}

/// One suggested substitute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substitute {
    /// Candidate identifier
    pub product_id: String,
    /// Candidate name
    pub product_name: String,
    /// Similarity in `[0, 1]`
    pub similarity_score: f64,
    /// `candidate.offer_price - original.offer_price`
    pub price_difference: f64,
    /// Rationale
    pub reason: String,
}

/// Deterministic ranking: candidate order, score `0.8 - 0.1 * index`
#[must_use]
pub fn fallback_substitutes(
    original: &ProductBrief,
    candidates: &[ProductBrief],
    top_n: usize,
) -> Vec<Substitute> {
    candidates
        .iter()
        .take(top_n)
        .enumerate()
        .map(|(index, candidate)| {
            #[allow(clippy::cast_precision_loss)]
            let step = 0.1 * index as f64;
            Substitute {
                product_id: candidate.product_id.clone(),
                product_name: candidate.product_name.clone(),
                similarity_score: round2(0.8 - step),
                price_difference: round2(candidate.offer_price - original.offer_price),
                reason: FALLBACK_REASON.to_string(),
            }
        })
        .collect()
}

fn validate(
    substitutes: Vec<Substitute>,
    shown: &[ProductBrief],
    top_n: usize,
) -> AdvisorResult<Vec<Substitute>> {
    if substitutes.is_empty() {
        return Err(AdvisorError::shape("no substitutes returned"));
    }
    let known: HashSet<&str> = shown.iter().map(|p| p.product_id.as_str()).collect();
    for substitute in &substitutes {
        if !known.contains(substitute.product_id.as_str()) {
            return Err(AdvisorError::shape(format!(
                "unknown product id {}",
                substitute.product_id
            )));
        }
        if !substitute.similarity_score.is_finite()
            || !(0.0..=1.0).contains(&substitute.similarity_score)
        {
            return Err(AdvisorError::shape("similarity_score outside [0, 1]"));
        }
        if !substitute.price_difference.is_finite() {
            return Err(AdvisorError::shape("price_difference is not finite"));
        }
    }
    Ok(substitutes.into_iter().take(top_n).collect())
}

impl Advisor {
    /// Suggest up to `top_n` substitutes among `candidates`
    ///
    /// `top_n` is bounded by the candidate count. With no candidates the
    /// provider is not called.
    pub async fn suggest_substitutes(
        &self,
        original: &ProductBrief,
        candidates: &[ProductBrief],
        top_n: usize,
    ) -> Advice<Vec<Substitute>> {
        let top_n = top_n.min(candidates.len());
        if top_n == 0 {
            return Advice::fallback(Vec::new());
        }

        let shown = &candidates[..candidates.len().min(SHOWN_CANDIDATES)];
        let alternatives: Vec<_> = shown
            .iter()
            .map(|p| {
                json!({
                    "name": p.product_name,
                    "price": p.offer_price,
                    "category": p.category.as_deref().unwrap_or("Unknown"),
                    "id": p.product_id,
                })
            })
            .collect();
        let alternatives =
            serde_json::to_string_pretty(&alternatives).unwrap_or_else(|_| "[]".to_string());
        let product_info = format!(
            "Product: {}, Price: \u{20b9}{}",
            original.product_name, original.offer_price
        );
        let request = CompletionRequest::new(
            prompts::SUBSTITUTION_SYSTEM,
            prompts::substitution_prompt(top_n, &product_info, &alternatives),
        )
        .with_max_tokens(600)
        .with_temperature(0.3);

        let result = complete_json(&self.provider, &request, self.timeout, |subs: Vec<Substitute>| {
            validate(subs, shown, top_n)
        })
        .await;
        settle("suggest_substitutes", result, || {
            fallback_substitutes(original, candidates, top_n)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockTextProvider, ProviderHandle};
    use pretty_assertions::assert_eq;

    fn brief(id: &str, name: &str, price: f64) -> ProductBrief {
        ProductBrief {
            product_id: id.to_string(),
            product_name: name.to_string(),
            offer_price: price,
            category: Some("Dairy".to_string()),
        }
    }

    fn candidates(n: usize) -> Vec<ProductBrief> {
        (0..n)
            .map(|i| brief(&format!("c{i}"), &format!("Milk {i}"), 50.0 + i as f64))
            .collect()
    }

    #[test]
    fn fallback_scores_step_down() {
        let original = brief("o", "Milk", 52.0);
        let subs = fallback_substitutes(&original, &candidates(5), 3);
        let scores: Vec<f64> = subs.iter().map(|s| s.similarity_score).collect();
        assert_eq!(scores, vec![0.8, 0.7, 0.6]);
        assert_eq!(subs[0].price_difference, -2.0);
        assert_eq!(subs[2].product_id, "c2");
        assert!(subs.iter().all(|s| s.reason == FALLBACK_REASON));
    }

    #[tokio::test]
    async fn no_candidates_skips_provider() {
        let mut mock = MockTextProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_complete().never();
        let advisor = Advisor::new(ProviderHandle::available(mock));
        let advice = advisor
            .suggest_substitutes(&brief("o", "Milk", 52.0), &[], 5)
            .await;
        assert!(advice.is_fallback());
        assert!(advice.value.is_empty());
    }

    #[tokio::test]
    async fn accepts_valid_ranking() {
        let mut mock = MockTextProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_complete().returning(|_| {
            Ok(r#"[
                {"product_id": "c3", "product_name": "Milk 3", "similarity_score": 0.95, "price_difference": 1, "reason": "same brand"},
                {"product_id": "c0", "product_name": "Milk 0", "similarity_score": 0.9, "price_difference": -2, "reason": "cheaper"},
                {"product_id": "c1", "product_name": "Milk 1", "similarity_score": 0.5, "price_difference": -1, "reason": "close"}
            ]"#
            .to_string())
        });
        let advisor = Advisor::new(ProviderHandle::available(mock));
        let advice = advisor
            .suggest_substitutes(&brief("o", "Milk", 52.0), &candidates(4), 2)
            .await;
        assert!(!advice.is_fallback());
        let ids: Vec<_> = advice.value.iter().map(|s| s.product_id.as_str()).collect();
        assert_eq!(ids, vec!["c3", "c0"]);
    }

    #[tokio::test]
    async fn rejects_unshown_candidate() {
        let mut mock = MockTextProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_complete().returning(|_| {
            Ok(r#"[{"product_id": "c11", "product_name": "Milk 11", "similarity_score": 0.9, "price_difference": 0, "reason": "x"}]"#.to_string())
        });
        let advisor = Advisor::new(ProviderHandle::available(mock));
        let advice = advisor
            .suggest_substitutes(&brief("o", "Milk", 52.0), &candidates(12), 3)
            .await;
        assert!(advice.is_fallback());
        assert_eq!(advice.value.len(), 3);
    }

    #[tokio::test]
    async fn rejects_out_of_range_score() {
        let mut mock = MockTextProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_complete().returning(|_| {
            Ok(r#"[{"product_id": "c0", "product_name": "Milk 0", "similarity_score": 7, "price_difference": 0, "reason": "x"}]"#.to_string())
        });
        let advisor = Advisor::new(ProviderHandle::available(mock));
        let advice = advisor
            .suggest_substitutes(&brief("o", "Milk", 52.0), &candidates(2), 5)
            .await;
        assert!(advice.is_fallback());
        assert_eq!(advice.value.len(), 2);
    }
}
