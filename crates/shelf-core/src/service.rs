//! Analytics facade
//!
//! One method per exposed operation. Each takes raw caller parameters,
//! validates them, applies the configured defaults and returns a
//! serializable result or a classified [`ServiceError`].

use crate::clock::{Clock, SystemClock};
use crate::config::QueryDefaults;
use crate::error::{ServiceError, ServiceResult};
use serde::Serialize;
use shelf_metrics::filter::parse_object_id;
use shelf_metrics::{
    CategoryDistribution, CategorySales, Filter, FilterParams, LowStockProduct, Metrics,
    MonthlyRevenue, OrderValueSummary, OrdersPerMonth, ProductSales, RecentOrders,
    RecentOrdersQuery, StorePerformance, StoreSummary, TimeOfDaySales, TopCustomer, UnsoldReport,
};
use shelf_store::{DocumentStore, ObjectId};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Scalar or list metric selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Matching orders
    SalesCount,
    /// Matching products
    ProductCount,
    /// Sum of order totals
    Revenue,
    /// Revenue, orders and their ratio
    AverageOrderValue,
    /// Revenue per calendar month
    MonthlyRevenue,
    /// Mean orders per month with breakdown
    OrdersPerMonth,
    /// Orders per time-of-day band
    TimeOfDay,
    /// Orders counted as customers
    TotalCustomers,
    /// Distinct customers
    UniqueCustomers,
    /// Highest-spending customers
    TopCustomers,
}

impl MetricKind {
    /// Every metric, in listing order
    pub const ALL: [MetricKind; 10] = [
        MetricKind::SalesCount,
        MetricKind::ProductCount,
        MetricKind::Revenue,
        MetricKind::AverageOrderValue,
        MetricKind::MonthlyRevenue,
        MetricKind::OrdersPerMonth,
        MetricKind::TimeOfDay,
        MetricKind::TotalCustomers,
        MetricKind::UniqueCustomers,
        MetricKind::TopCustomers,
    ];

    /// Kebab-case name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            MetricKind::SalesCount => "sales-count",
            MetricKind::ProductCount => "product-count",
            MetricKind::Revenue => "revenue",
            MetricKind::AverageOrderValue => "average-order-value",
            MetricKind::MonthlyRevenue => "monthly-revenue",
            MetricKind::OrdersPerMonth => "orders-per-month",
            MetricKind::TimeOfDay => "time-of-day",
            MetricKind::TotalCustomers => "total-customers",
            MetricKind::UniqueCustomers => "unique-customers",
            MetricKind::TopCustomers => "top-customers",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                let known: Vec<_> = MetricKind::ALL.iter().map(|k| k.name()).collect();
                ServiceError::invalid_parameter(
                    "metric",
                    format!("unknown metric '{s}', expected one of: {}", known.join(", ")),
                )
            })
    }
}

/// Value of a named metric
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Count
    Count(u64),
    /// Amount
    Amount(f64),
    /// Average order value summary
    OrderValue(OrderValueSummary),
    /// Monthly revenue rows
    Monthly(Vec<MonthlyRevenue>),
    /// Orders per month
    OrdersPerMonth(OrdersPerMonth),
    /// Time-of-day bands
    TimeOfDay(Vec<TimeOfDaySales>),
    /// Top customers
    Customers(Vec<TopCustomer>),
}

/// Analytics operations over one document store
#[derive(Clone)]
pub struct AnalyticsService {
    metrics: Metrics,
    defaults: QueryDefaults,
    clock: Arc<dyn Clock>,
}

impl AnalyticsService {
    /// Create service over store
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, defaults: QueryDefaults) -> Self {
        Self {
            metrics: Metrics::new(store),
            defaults,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Underlying metrics
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configured defaults
    #[must_use]
    pub fn defaults(&self) -> QueryDefaults {
        self.defaults
    }

    /// Time source
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Limit or the default, rejecting zero and values over the maximum
    ///
    /// # Errors
    /// `InvalidParameter` when out of `[1, max_limit]`
    pub fn resolve_limit(&self, limit: Option<u64>) -> ServiceResult<u64> {
        let limit = limit.unwrap_or(self.defaults.default_limit);
        if limit == 0 || limit > self.defaults.max_limit {
            return Err(ServiceError::invalid_parameter(
                "limit",
                format!("must be between 1 and {}", self.defaults.max_limit),
            ));
        }
        Ok(limit)
    }

    /// Period in days or the default
    ///
    /// # Errors
    /// `InvalidParameter` when out of `[0, max_period_days]`
    pub fn resolve_period(&self, days: Option<i64>) -> ServiceResult<i64> {
        let days = days.unwrap_or(self.defaults.default_period_days);
        if days < 0 {
            return Err(ServiceError::invalid_parameter("days", "must not be negative"));
        }
        if days > self.defaults.max_period_days {
            return Err(ServiceError::invalid_parameter(
                "days",
                format!("must be at most {}", self.defaults.max_period_days),
            ));
        }
        Ok(days)
    }

    /// Parse a store identifier
    ///
    /// # Errors
    /// `InvalidIdentifier` when malformed
    pub fn store_id(text: &str) -> ServiceResult<ObjectId> {
        Ok(parse_object_id("store_id", text)?)
    }

    /// Approved, active stores
    ///
    /// # Errors
    /// Data access failures
    pub async fn stores(&self) -> ServiceResult<Vec<StoreSummary>> {
        Ok(self.metrics.stores(self.clock.now()).await?)
    }

    /// Store identity with order outcomes, revenue and payouts
    ///
    /// # Errors
    /// Invalid id or period, missing store, data access failures
    pub async fn store_performance(
        &self,
        store_id: &str,
        days: Option<i64>,
    ) -> ServiceResult<StorePerformance> {
        let id = Self::store_id(store_id)?;
        let days = self.resolve_period(days)?;
        Ok(self
            .metrics
            .store_performance(id, days, self.clock.now())
            .await?)
    }

    /// Named metric under the common filter
    ///
    /// `limit` applies to `top-customers` only.
    ///
    /// # Errors
    /// Invalid filter or limit, data access failures
    pub async fn metric(
        &self,
        kind: MetricKind,
        params: &FilterParams,
        limit: Option<u64>,
    ) -> ServiceResult<MetricValue> {
        let filter = Filter::parse(params)?;
        info!(metric = %kind, store_id = %filter.store_id, "Computing metric");
        let m = &self.metrics;
        Ok(match kind {
            MetricKind::SalesCount => MetricValue::Count(m.sales_count(&filter).await?),
            MetricKind::ProductCount => MetricValue::Count(m.product_count(&filter).await?),
            MetricKind::Revenue => MetricValue::Amount(m.total_revenue(&filter).await?),
            MetricKind::AverageOrderValue => {
                MetricValue::OrderValue(m.average_order_value(&filter).await?)
            }
            MetricKind::MonthlyRevenue => MetricValue::Monthly(m.monthly_revenue(&filter).await?),
            MetricKind::OrdersPerMonth => {
                MetricValue::OrdersPerMonth(m.orders_per_month(&filter).await?)
            }
            MetricKind::TimeOfDay => MetricValue::TimeOfDay(m.sales_by_time_of_day(&filter).await?),
            MetricKind::TotalCustomers => MetricValue::Count(m.total_customers(&filter).await?),
            MetricKind::UniqueCustomers => MetricValue::Count(m.unique_customers(&filter).await?),
            MetricKind::TopCustomers => {
                let limit = self.resolve_limit(limit)?;
                MetricValue::Customers(m.top_customers(&filter, limit).await?)
            }
        })
    }

    /// Best sellers
    ///
    /// # Errors
    /// Invalid filter or limit, data access failures
    pub async fn top_selling_products(
        &self,
        params: &FilterParams,
        limit: Option<u64>,
    ) -> ServiceResult<Vec<ProductSales>> {
        let filter = Filter::parse(params)?;
        let limit = self.resolve_limit(limit)?;
        Ok(self.metrics.top_selling_products(&filter, limit).await?)
    }

    /// Worst sellers
    ///
    /// # Errors
    /// Invalid filter or limit, data access failures
    pub async fn low_selling_products(
        &self,
        params: &FilterParams,
        limit: Option<u64>,
    ) -> ServiceResult<Vec<ProductSales>> {
        let filter = Filter::parse(params)?;
        let limit = self.resolve_limit(limit)?;
        Ok(self.metrics.low_selling_products(&filter, limit).await?)
    }

    /// Category distribution over order lines
    ///
    /// # Errors
    /// Invalid filter, data access failures
    pub async fn category_distribution(
        &self,
        params: &FilterParams,
    ) -> ServiceResult<CategoryDistribution> {
        let filter = Filter::parse(params)?;
        Ok(self.metrics.category_distribution(&filter).await?)
    }

    /// Categories ranked by sales
    ///
    /// # Errors
    /// Invalid filter, data access failures
    pub async fn category_sales(&self, params: &FilterParams) -> ServiceResult<Vec<CategorySales>> {
        let filter = Filter::parse(params)?;
        Ok(self.metrics.category_sales(&filter).await?)
    }

    /// Products without sales in the last `days` days
    ///
    /// # Errors
    /// Invalid id or period, data access failures
    pub async fn unsold_products(&self, store_id: &str, days: Option<i64>) -> ServiceResult<UnsoldReport> {
        let id = Self::store_id(store_id)?;
        let days = self.resolve_period(days)?;
        Ok(self.metrics.unsold_products(id, days, self.clock.now()).await?)
    }

    /// Products flagged unavailable
    ///
    /// # Errors
    /// Invalid id or limit, data access failures
    pub async fn low_stock_products(
        &self,
        store_id: &str,
        limit: Option<u64>,
    ) -> ServiceResult<Vec<LowStockProduct>> {
        let id = Self::store_id(store_id)?;
        let limit = self.resolve_limit(limit)?;
        Ok(self.metrics.low_stock_products(id, limit).await?)
    }

    /// One page of recent orders
    ///
    /// # Errors
    /// Invalid filter or pagination, data access failures
    pub async fn recent_orders(
        &self,
        params: &FilterParams,
        query: &RecentOrdersQuery,
    ) -> ServiceResult<RecentOrders> {
        let filter = Filter::parse(params)?;
        if u64::try_from(query.limit).is_ok_and(|l| l > self.defaults.max_limit) {
            return Err(ServiceError::invalid_parameter(
                "limit",
                format!("must be between 1 and {}", self.defaults.max_limit),
            ));
        }
        Ok(self.metrics.recent_orders(&filter, query).await?)
    }
}

impl fmt::Debug for AnalyticsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsService")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_store::MemoryStore;

    fn service() -> AnalyticsService {
        AnalyticsService::new(Arc::new(MemoryStore::new()), QueryDefaults::default())
    }

    #[test]
    fn metric_names_round_trip() {
        for kind in MetricKind::ALL {
            assert_eq!(kind.name().parse::<MetricKind>().unwrap(), kind);
        }
        assert!("nope".parse::<MetricKind>().is_err());
    }

    #[test]
    fn limit_bounds() {
        let service = service();
        assert_eq!(service.resolve_limit(None).unwrap(), 10);
        assert_eq!(service.resolve_limit(Some(100)).unwrap(), 100);
        assert!(service.resolve_limit(Some(0)).is_err());
        assert!(service.resolve_limit(Some(101)).is_err());
    }

    #[test]
    fn period_bounds() {
        let service = service();
        assert_eq!(service.resolve_period(None).unwrap(), 30);
        assert_eq!(service.resolve_period(Some(0)).unwrap(), 0);
        assert_eq!(service.resolve_period(Some(3650)).unwrap(), 3650);
        assert!(service.resolve_period(Some(-1)).is_err());
        assert!(service.resolve_period(Some(3651)).is_err());
        assert!(service.resolve_period(Some(i64::MAX)).is_err());
    }

    #[tokio::test]
    async fn malformed_store_is_client_error() {
        let err = service()
            .metric(MetricKind::Revenue, &FilterParams::new("not-an-id"), None)
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }
}
