//! Sales and revenue pipelines
//!
//! Order-collection aggregates under the common filter:
//! - order count, revenue sum, average order value
//! - monthly revenue and orders-per-month
//! - time-of-day buckets

use crate::engine::Metrics;
use crate::error::MetricsResult;
use crate::filter::Filter;
use crate::normalize::{round2, safe_ratio, RowExt};
use serde::{Deserialize, Serialize};
use shelf_store::{Accumulator, Collection, Expr, Pipeline, Predicate, Projection, SortOrder};

/// Revenue of one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    /// Calendar year
    pub year: i64,
    /// Calendar month (1-12)
    pub month: i64,
    /// Sum of order totals
    pub total_revenue: f64,
}

/// Revenue, order count and their ratio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderValueSummary {
    /// `total_revenue / total_orders`, 0 without orders
    pub avg_order_value: f64,
    /// Matching orders
    pub total_orders: u64,
    /// Sum of order totals
    pub total_revenue: f64,
}

/// Order count of one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyOrders {
    /// Calendar year
    pub year: i64,
    /// Calendar month (1-12)
    pub month: i64,
    /// Orders created in the month
    pub sales: u64,
}

/// Mean orders per active month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdersPerMonth {
    /// Mean of the per-month counts
    pub avg_sales_per_month: f64,
    /// Months with at least one order
    pub months_count: u64,
    /// Orders across all months
    pub total_sales: u64,
    /// Per-month breakdown, chronological
    pub by_month: Vec<MonthlyOrders>,
}

/// Fixed time-of-day bands over the creation hour (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeBand {
    /// `[6, 12)`
    Morning,
    /// `[12, 18)`
    Afternoon,
    /// `[18, 21)`
    Evening,
    /// Any other hour
    Night,
}

impl TimeBand {
    /// Bands in reporting order
    pub const ALL: [TimeBand; 4] = [
        TimeBand::Morning,
        TimeBand::Afternoon,
        TimeBand::Evening,
        TimeBand::Night,
    ];

    /// Band label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TimeBand::Morning => "Morning",
            TimeBand::Afternoon => "Afternoon",
            TimeBand::Evening => "Evening",
            TimeBand::Night => "Night",
        }
    }

    /// Half-open hour range `[start, end)`; `None` for the catch-all band
    #[must_use]
    pub const fn hours(self) -> Option<(i32, i32)> {
        match self {
            TimeBand::Morning => Some((6, 12)),
            TimeBand::Afternoon => Some((12, 18)),
            TimeBand::Evening => Some((18, 21)),
            TimeBand::Night => None,
        }
    }

    /// Band of an hour of day
    #[must_use]
    pub fn of_hour(hour: i32) -> Self {
        Self::ALL
            .into_iter()
            .find(|band| band.hours().is_some_and(|(start, end)| (start..end).contains(&hour)))
            .unwrap_or(TimeBand::Night)
    }

    fn bucket(hour: Expr) -> Expr {
        let label = |band: TimeBand| Expr::lit(band.label());
        Expr::Switch {
            branches: Self::ALL
                .into_iter()
                .filter_map(|band| {
                    band.hours()
                        .map(|(start, end)| (hour.clone().within(start, end), label(band)))
                })
                .collect(),
            default: Box::new(label(TimeBand::Night)),
        }
    }
}

/// Orders and received amount in one band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeOfDaySales {
    /// Band
    pub period: TimeBand,
    /// Orders created in the band
    pub orders_count: u64,
    /// Sum of `amountReceived`
    pub total_revenue: f64,
}

/// Group-all revenue and order count
#[must_use]
pub fn revenue_pipeline(predicate: Predicate) -> Pipeline {
    Pipeline::new().matching(predicate).group(
        Expr::null(),
        [
            ("totalOrders", Accumulator::count()),
            ("totalRevenue", Accumulator::sum("total")),
        ],
    )
}

fn year_month_key() -> Expr {
    Expr::object([
        ("year", Expr::field("createdAt").year()),
        ("month", Expr::field("createdAt").month()),
    ])
}

fn chronological() -> [(&'static str, SortOrder); 2] {
    [("_id.year", SortOrder::Ascending), ("_id.month", SortOrder::Ascending)]
}

/// Revenue per `(year, month)`, ascending
#[must_use]
pub fn monthly_revenue_pipeline(predicate: Predicate) -> Pipeline {
    Pipeline::new()
        .matching(predicate)
        .group(year_month_key(), [("totalRevenue", Accumulator::sum("total"))])
        .sort(chronological())
}

/// Orders per month, then mean and breakdown in one row
#[must_use]
pub fn orders_per_month_pipeline(predicate: Predicate) -> Pipeline {
    Pipeline::new()
        .matching(predicate)
        .group(year_month_key(), [("sales", Accumulator::count())])
        .sort(chronological())
        .group(
            Expr::null(),
            [
                ("months_count", Accumulator::count()),
                ("total_sales", Accumulator::sum("sales")),
                ("avg_sales_per_month", Accumulator::Avg(Expr::field("sales"))),
                (
                    "by_month",
                    Accumulator::Push(Expr::object([
                        ("year", Expr::field("_id.year")),
                        ("month", Expr::field("_id.month")),
                        ("sales", Expr::field("sales")),
                    ])),
                ),
            ],
        )
}

/// Orders and received amount per time-of-day band
#[must_use]
pub fn time_of_day_pipeline(predicate: Predicate) -> Pipeline {
    Pipeline::new()
        .matching(predicate)
        .project([
            ("hour", Projection::Computed(Expr::field("createdAt").hour())),
            ("amount", Projection::Computed(Expr::field("amountReceived"))),
        ])
        .group(
            TimeBand::bucket(Expr::field("hour")),
            [
                ("orders_count", Accumulator::count()),
                ("total_revenue", Accumulator::sum("amount")),
            ],
        )
}

impl Metrics {
    /// Orders matching the filter
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn sales_count(&self, filter: &Filter) -> MetricsResult<u64> {
        let predicate = filter.order_predicate(self.store()).await?;
        self.count(Collection::Orders, predicate, "sales_count").await
    }

    /// Products matching the filter
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn product_count(&self, filter: &Filter) -> MetricsResult<u64> {
        self.count(Collection::Products, filter.product_predicate(), "product_count")
            .await
    }

    /// Sum of order totals, 0 without matches
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn total_revenue(&self, filter: &Filter) -> MetricsResult<f64> {
        Ok(self.order_value(filter, "total_revenue").await?.total_revenue)
    }

    /// Average order value with explicit zero for no orders
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn average_order_value(&self, filter: &Filter) -> MetricsResult<OrderValueSummary> {
        self.order_value(filter, "average_order_value").await
    }

    async fn order_value(
        &self,
        filter: &Filter,
        operation: &'static str,
    ) -> MetricsResult<OrderValueSummary> {
        let predicate = filter.order_predicate(self.store()).await?;
        let rows = self
            .run(Collection::Orders, &revenue_pipeline(predicate), operation)
            .await?;
        let (total_orders, total_revenue) = rows.first().map_or((0, 0.0), |row| {
            (row.u64_or_zero("totalOrders"), row.f64_or("totalRevenue", 0.0))
        });
        #[allow(clippy::cast_precision_loss)]
        let avg_order_value = safe_ratio(total_revenue, total_orders as f64);
        Ok(OrderValueSummary {
            avg_order_value,
            total_orders,
            total_revenue: round2(total_revenue),
        })
    }

    /// Revenue per calendar month, chronological
    ///
    /// # Errors
    /// `DataAccess` on store failure, `MalformedResult` for rows without a month key
    pub async fn monthly_revenue(&self, filter: &Filter) -> MetricsResult<Vec<MonthlyRevenue>> {
        const OP: &str = "monthly_revenue";
        let predicate = filter.order_predicate(self.store()).await?;
        let rows = self
            .run(Collection::Orders, &monthly_revenue_pipeline(predicate), OP)
            .await?;
        rows.iter()
            .filter(|row| row.get_path("_id.year").is_some())
            .map(|row| {
                Ok(MonthlyRevenue {
                    year: row.require_i64("_id.year", OP)?,
                    month: row.require_i64("_id.month", OP)?,
                    total_revenue: round2(row.f64_or("totalRevenue", 0.0)),
                })
            })
            .collect()
    }

    /// Mean orders per month with breakdown
    ///
    /// # Errors
    /// `DataAccess` on store failure, `MalformedResult` for malformed breakdown rows
    pub async fn orders_per_month(&self, filter: &Filter) -> MetricsResult<OrdersPerMonth> {
        const OP: &str = "orders_per_month";
        let predicate = filter.order_predicate(self.store()).await?;
        let rows = self
            .run(Collection::Orders, &orders_per_month_pipeline(predicate), OP)
            .await?;
        let Some(row) = rows.first() else {
            return Ok(OrdersPerMonth {
                avg_sales_per_month: 0.0,
                months_count: 0,
                total_sales: 0,
                by_month: Vec::new(),
            });
        };

        let by_month = row
            .get_array("by_month")
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.as_document())
            .filter(|m| m.get_path("year").is_some())
            .map(|m| {
                Ok(MonthlyOrders {
                    year: m.require_i64("year", OP)?,
                    month: m.require_i64("month", OP)?,
                    sales: m.u64_or_zero("sales"),
                })
            })
            .collect::<MetricsResult<Vec<_>>>()?;

        Ok(OrdersPerMonth {
            avg_sales_per_month: round2(row.f64_or("avg_sales_per_month", 0.0)),
            months_count: row.u64_or_zero("months_count"),
            total_sales: row.u64_or_zero("total_sales"),
            by_month,
        })
    }

    /// Orders and received amount per time-of-day band
    ///
    /// Only COMPLETED orders are bucketed when the filter has no status. All
    /// four bands are reported, empty ones with zeros.
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn sales_by_time_of_day(&self, filter: &Filter) -> MetricsResult<Vec<TimeOfDaySales>> {
        let mut filter = filter.clone();
        if filter.status.is_none() {
            filter.status = Some("COMPLETED".to_string());
        }
        let predicate = filter.order_predicate(self.store()).await?;
        let rows = self
            .run(Collection::Orders, &time_of_day_pipeline(predicate), "sales_by_time_of_day")
            .await?;

        Ok(TimeBand::ALL
            .into_iter()
            .map(|band| {
                let row = rows.iter().find(|r| r.get_str("_id") == Some(band.label()));
                TimeOfDaySales {
                    period: band,
                    orders_count: row.map_or(0, |r| r.u64_or_zero("orders_count")),
                    total_revenue: row.map_or(0.0, |r| round2(r.f64_or("total_revenue", 0.0))),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_cover_every_hour() {
        assert_eq!(TimeBand::of_hour(5), TimeBand::Night);
        assert_eq!(TimeBand::of_hour(6), TimeBand::Morning);
        assert_eq!(TimeBand::of_hour(12), TimeBand::Afternoon);
        assert_eq!(TimeBand::of_hour(18), TimeBand::Evening);
        assert_eq!(TimeBand::of_hour(21), TimeBand::Night);
        assert_eq!(TimeBand::of_hour(0), TimeBand::Night);
    }

    #[test]
    fn pipeline_switch_follows_band_table() {
        let Expr::Switch { branches, default } = TimeBand::bucket(Expr::field("hour")) else {
            panic!("expected a switch");
        };
        assert_eq!(branches.len(), 3);
        for ((condition, label), band) in branches.into_iter().zip(TimeBand::ALL) {
            let (start, end) = band.hours().unwrap();
            assert_eq!(condition, Expr::field("hour").within(start, end));
            assert_eq!(label, Expr::lit(band.label()));
        }
        assert_eq!(*default, Expr::lit("Night"));
    }

    #[test]
    fn revenue_pipeline_groups_everything() {
        let pipeline = revenue_pipeline(Predicate::All);
        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.stages()[1].name(), "$group");
    }
}
