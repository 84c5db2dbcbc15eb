//! AI-touching flows
//!
//! Each flow reads what it needs through [`Metrics`], hands a plain context
//! to the [`Advisor`] and returns a structurally valid result whether the
//! text provider answered or not:
//! - query assistant (question → filter → products → answer)
//! - substitutes for one product, and for every low-stock product
//! - discount strategy from performance and aged inventory
//! - stock alerts with per-product recommendations

use crate::clock::Clock;
use crate::config::ShelfConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::service::AnalyticsService;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use shelf_advisor::{
    Advisor, AnswerContext, DiscountContext, DiscountStrategy, PerformanceSnapshot, ProductBrief,
    Source, StockRecommendation, StockSnapshot, Substitute,
};
use shelf_metrics::filter::parse_object_id;
use shelf_metrics::{CatalogProduct, Metrics, StockItem};
use shelf_store::DocumentStore;
use std::sync::Arc;
use tracing::info;

/// Products fetched for a question
pub const QUERY_PRODUCT_LIMIT: u64 = 50;
/// Substitute candidates drawn per product
pub const CANDIDATE_CAP: u64 = 15;
/// Substitutes per product when not given
pub const DEFAULT_TOP_N: usize = 5;
/// Substitutes per low-stock product in quick analysis when not given
pub const QUICK_ANALYSIS_TOP_N: usize = 4;
/// Largest accepted `top_n`
pub const MAX_TOP_N: usize = 10;
/// Low-stock products covered by quick analysis
pub const QUICK_ANALYSIS_PRODUCTS: u64 = 5;
/// Lookback for discount recommendations, in days
pub const DISCOUNT_PERIOD_DAYS: i64 = 30;
/// Longest accepted question, in characters
pub const MAX_QUERY_CHARS: usize = 200;

const SESSION_ID_LEN: usize = 16;

/// Answer to a free-text question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    /// Generated session identifier
    pub session_id: String,
    /// Store identifier as given
    pub store_id: String,
    /// Trimmed question
    pub query: String,
    /// Natural-language answer
    pub response: String,
    /// Products matched by the translated filter
    pub products_found: usize,
    /// Distinct categories of those products
    pub categories_found: usize,
    /// Filter that was executed, before store scoping
    pub filter: serde_json::Value,
    /// Provenance of the filter
    pub filter_source: Source,
    /// Provenance of the answer text
    pub response_source: Source,
}

/// Name and price of the product being replaced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalProduct {
    /// Product name
    pub name: String,
    /// Offer price
    pub price: f64,
}

/// Substitutes for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstituteReport {
    /// Store identifier
    pub store_id: String,
    /// Product being replaced
    pub original_product: OriginalProduct,
    /// Ranked substitutes
    pub substitutes: Vec<Substitute>,
    /// Provenance
    pub source: Source,
}

/// Discount strategy for a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountReport {
    /// Store identifier
    pub store_id: String,
    /// Strategy
    pub recommendations: DiscountStrategy,
    /// Provenance
    pub source: Source,
    /// Generation time, RFC 3339
    pub generated_at: String,
}

/// Stock snapshot with its recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAlert {
    /// Product snapshot
    #[serde(flatten)]
    pub item: StockItem,
    /// Recommended action
    pub recommendation: String,
    /// Rationale
    pub reasoning: String,
    /// Provenance
    pub source: Source,
}

/// Stock alerts of a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAlerts {
    /// Store identifier
    pub store_id: String,
    /// Alerts, highest stock first
    pub alerts: Vec<StockAlert>,
}

/// Substitutes for one low-stock product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockSubstitutes {
    /// Low-stock product identifier
    pub product_id: String,
    /// Low-stock product name
    pub product_name: String,
    /// Ranked substitutes
    pub substitutes: Vec<Substitute>,
    /// Provenance
    pub source: Source,
}

/// Substitutes for every low-stock product of a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickAnalysis {
    /// Store identifier
    pub store_id: String,
    /// One entry per low-stock product
    pub results: Vec<LowStockSubstitutes>,
}

fn brief(product: &CatalogProduct) -> ProductBrief {
    ProductBrief {
        product_id: product.product_id.clone(),
        product_name: product.product_name.clone(),
        offer_price: product.offer_price,
        category: product.category_name.clone(),
    }
}

fn snapshot(item: &StockItem) -> StockSnapshot {
    StockSnapshot {
        product_name: item.product_name.clone(),
        mrp_price: item.mrp_price,
        offer_price: item.offer_price,
        pos_price: Some(item.pos_price).filter(|p| *p > 0.0),
        stock_quantity: item.stock_quantity,
    }
}

fn session_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(SESSION_ID_LEN);
    id
}

fn resolve_top_n(top_n: Option<usize>, default: usize) -> ServiceResult<usize> {
    let top_n = top_n.unwrap_or(default);
    if top_n == 0 || top_n > MAX_TOP_N {
        return Err(ServiceError::invalid_parameter(
            "top_n",
            format!("must be between 1 and {MAX_TOP_N}"),
        ));
    }
    Ok(top_n)
}

/// Assistant flows over one document store and one advisor
#[derive(Debug, Clone)]
pub struct AssistantService {
    analytics: AnalyticsService,
    advisor: Advisor,
}

impl AssistantService {
    /// Create service
    #[must_use]
    pub fn new(analytics: AnalyticsService, advisor: Advisor) -> Self {
        Self { analytics, advisor }
    }

    /// Service over `store` with the configured bounds and provider
    ///
    /// # Errors
    /// `ConfigError::Provider` when the provider client cannot be built
    pub fn from_config(store: Arc<dyn DocumentStore>, config: &ShelfConfig) -> ServiceResult<Self> {
        let advisor =
            Advisor::new(config.provider_handle()?).with_timeout(config.provider_timeout());
        Ok(Self::new(AnalyticsService::new(store, config.queries), advisor))
    }

    /// Advisor in use
    #[must_use]
    pub fn advisor(&self) -> &Advisor {
        &self.advisor
    }

    fn metrics(&self) -> &Metrics {
        self.analytics.metrics()
    }

    fn clock(&self) -> &dyn Clock {
        self.analytics.clock()
    }

    /// Answer a free-text question about a store's catalog
    ///
    /// # Errors
    /// Invalid store id, empty or overlong question, data access failures
    pub async fn ask(&self, store_id: &str, question: &str) -> ServiceResult<QueryAnswer> {
        let store = AnalyticsService::store_id(store_id)?;
        let query = question.trim();
        if query.is_empty() {
            return Err(ServiceError::invalid_parameter("query", "must not be empty"));
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(ServiceError::invalid_parameter(
                "query",
                format!("must be at most {MAX_QUERY_CHARS} characters"),
            ));
        }

        let session_id = session_id();
        let translated = self.advisor.translate_filter(query).await;
        let filter = translated.filter.clone();
        let filter_source = translated.source;
        let predicate = translated.scoped_to(store);

        let products = self
            .metrics()
            .search_products(predicate, QUERY_PRODUCT_LIMIT)
            .await?;
        let categories = self.metrics().categories_of(&products).await?;
        info!(
            session_id = %session_id,
            store_id = %store,
            products = products.len(),
            categories = categories.len(),
            "Answering query"
        );

        let context = AnswerContext {
            query: query.to_string(),
            store_id: store_id.to_string(),
            product_names: products
                .iter()
                .map(|p| p.get_str("ProductName").unwrap_or("Unknown").to_string())
                .collect(),
            category_names: categories
                .iter()
                .map(|c| c.get_str("name").unwrap_or("Unknown").to_string())
                .collect(),
        };
        let answer = self.advisor.compose_answer(&context).await;

        Ok(QueryAnswer {
            session_id,
            store_id: store_id.to_string(),
            query: query.to_string(),
            response: answer.value,
            products_found: products.len(),
            categories_found: categories.len(),
            filter,
            filter_source,
            response_source: answer.source,
        })
    }

    /// Same-category substitutes for a product
    ///
    /// # Errors
    /// Invalid ids or `top_n`, missing product, data access failures
    pub async fn substitutes(
        &self,
        store_id: &str,
        product_id: &str,
        top_n: Option<usize>,
    ) -> ServiceResult<SubstituteReport> {
        let store = AnalyticsService::store_id(store_id)?;
        let product = parse_object_id("product_id", product_id)?;
        let top_n = resolve_top_n(top_n, DEFAULT_TOP_N)?;

        let original = self.metrics().product(store, product).await?;
        let (substitutes, source) = self.rank_substitutes(store, &original, top_n).await?;
        Ok(SubstituteReport {
            store_id: store_id.to_string(),
            original_product: OriginalProduct {
                name: original.product_name,
                price: original.offer_price,
            },
            substitutes,
            source,
        })
    }

    async fn rank_substitutes(
        &self,
        store: shelf_store::ObjectId,
        original: &CatalogProduct,
        top_n: usize,
    ) -> ServiceResult<(Vec<Substitute>, Source)> {
        let candidates = self
            .metrics()
            .substitute_candidates(store, original, CANDIDATE_CAP)
            .await?;
        let briefs: Vec<ProductBrief> = candidates.iter().map(brief).collect();
        let advice = self
            .advisor
            .suggest_substitutes(&brief(original), &briefs, top_n)
            .await;
        Ok((advice.value, advice.source))
    }

    /// Discount strategy from the last 30 days and unsold inventory
    ///
    /// # Errors
    /// Invalid store id, missing store, data access failures
    pub async fn discounts(&self, store_id: &str) -> ServiceResult<DiscountReport> {
        let performance = self
            .analytics
            .store_performance(store_id, Some(DISCOUNT_PERIOD_DAYS))
            .await?
            .performance_metrics;
        let unsold = self
            .analytics
            .unsold_products(store_id, Some(DISCOUNT_PERIOD_DAYS))
            .await?;

        let context = DiscountContext {
            performance: PerformanceSnapshot {
                completion_rate: performance.completion_rate,
                total_orders: performance.total_orders,
                total_revenue: performance.total_revenue,
            },
            days_in_inventory: unsold
                .unsold_products
                .iter()
                .map(|p| p.days_in_inventory)
                .collect(),
        };
        let advice = self.advisor.recommend_discounts(&context).await;
        Ok(DiscountReport {
            store_id: store_id.to_string(),
            recommendations: advice.value,
            source: advice.source,
            generated_at: self.clock().now().to_rfc3339(),
        })
    }

    /// Highest-stock products with a recommendation each
    ///
    /// Recommendations are requested concurrently.
    ///
    /// # Errors
    /// Invalid store id, data access failures
    pub async fn stock_alerts(&self, store_id: &str) -> ServiceResult<StockAlerts> {
        let store = AnalyticsService::store_id(store_id)?;
        let items = self.metrics().stock_alert_candidates(store).await?;
        let advice = join_all(
            items
                .iter()
                .map(|item| async move { self.advisor.recommend_stock_action(&snapshot(item)).await }),
        )
        .await;

        let alerts = items
            .into_iter()
            .zip(advice)
            .map(|(item, advice)| {
                let StockRecommendation {
                    recommendation,
                    reasoning,
                } = advice.value;
                StockAlert {
                    item,
                    recommendation,
                    reasoning,
                    source: advice.source,
                }
            })
            .collect();
        Ok(StockAlerts {
            store_id: store_id.to_string(),
            alerts,
        })
    }

    /// Substitutes for each of the lowest-stock unavailable products
    ///
    /// # Errors
    /// Invalid store id or `top_n`, data access failures
    pub async fn quick_analysis(
        &self,
        store_id: &str,
        top_n: Option<usize>,
    ) -> ServiceResult<QuickAnalysis> {
        let store = AnalyticsService::store_id(store_id)?;
        let top_n = resolve_top_n(top_n, QUICK_ANALYSIS_TOP_N)?;
        let low_stock = self
            .metrics()
            .low_stock_products(store, QUICK_ANALYSIS_PRODUCTS)
            .await?;
        info!(store_id = %store, products = low_stock.len(), top_n, "Running quick analysis");

        let mut results = Vec::with_capacity(low_stock.len());
        for item in low_stock {
            let product = parse_object_id("product_id", &item.product_id)?;
            let original = self.metrics().product(store, product).await?;
            let (substitutes, source) = self.rank_substitutes(store, &original, top_n).await?;
            results.push(LowStockSubstitutes {
                product_id: item.product_id,
                product_name: item.product_name,
                substitutes,
                source,
            });
        }
        Ok(QuickAnalysis {
            store_id: store_id.to_string(),
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_short_hex() {
        let id = session_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, session_id());
    }

    #[test]
    fn top_n_bounds() {
        assert_eq!(resolve_top_n(None, DEFAULT_TOP_N).unwrap(), 5);
        assert_eq!(resolve_top_n(None, QUICK_ANALYSIS_TOP_N).unwrap(), 4);
        assert_eq!(resolve_top_n(Some(10), 5).unwrap(), 10);
        assert!(resolve_top_n(Some(0), 5).is_err());
        assert!(resolve_top_n(Some(11), 5).is_err());
    }

    #[test]
    fn zero_pos_price_is_absent() {
        let item = StockItem {
            product_id: "p".into(),
            product_name: "Rice".into(),
            stock_quantity: 40,
            mrp_price: 60.0,
            offer_price: 55.0,
            pos_price: 0.0,
            updated_at: None,
        };
        assert_eq!(snapshot(&item).pos_price, None);
    }
}
