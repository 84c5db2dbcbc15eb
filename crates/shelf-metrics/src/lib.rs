//! Shelf Metrics - analytics pipelines over a document store
//!
//! Turns the common filter parameters into store predicates, runs the
//! parameterized aggregation pipelines and shapes their rows:
//! - Filter Builder (`filter`): store, date range, status, category
//! - Pipeline Library (`sales`, `customers`, `products`, `categories`,
//!   `orders`, `stores`, `catalog`)
//! - Result Normalizer (`normalize`): identifier rendering, safe ratios, ranks
//!
//! Every operation is a stateless read through [`Metrics`], which holds the
//! store as `Arc<dyn DocumentStore>`.
//!
//! # Example
//!
//! ```rust,ignore
//! use shelf_metrics::prelude::*;
//!
//! # async fn example(store: std::sync::Arc<dyn shelf_store::DocumentStore>) -> MetricsResult<()> {
//! let metrics = Metrics::new(store);
//! let filter = Filter::parse(&FilterParams::new("64b7f0c2a1b2c3d4e5f60718"))?;
//! let top = metrics.top_selling_products(&filter, 10).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod catalog;
pub mod categories;
pub mod customers;
mod engine;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod orders;
pub mod products;
pub mod sales;
pub mod stores;

pub use catalog::CatalogProduct;
pub use categories::{CategoryDistribution, CategorySales, CategoryShare};
pub use customers::TopCustomer;
pub use engine::Metrics;
pub use error::{MetricsError, MetricsResult};
pub use filter::{Filter, FilterParams, EXCLUDED_SALE_STATUSES};
pub use normalize::{document_to_json, safe_ratio, Urgency};
pub use orders::{OrderSummary, Pagination, RecentOrders, RecentOrdersQuery};
pub use products::{
    LowStockProduct, ProductSales, SalesRanking, StockItem, UnsoldProduct, UnsoldReport,
};
pub use sales::{
    MonthlyOrders, MonthlyRevenue, OrderValueSummary, OrdersPerMonth, TimeBand, TimeOfDaySales,
};
pub use stores::{PerformanceMetrics, StoreInfo, StorePerformance, StoreSummary};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for computing metrics
    pub use crate::{
        Filter, FilterParams, Metrics, MetricsError, MetricsResult, RecentOrdersQuery,
        SalesRanking, Urgency,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
