//! Customer rollups

use crate::engine::Metrics;
use crate::error::MetricsResult;
use crate::filter::Filter;
use crate::normalize::{round2, RowExt};
use serde::{Deserialize, Serialize};
use shelf_store::{Accumulator, Collection, Expr, Pipeline, Predicate, Projection, SortOrder};

/// Customer ranked by spend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCustomer {
    /// Customer identifier as string
    pub customer_id: String,
    /// Display name from the first order seen
    pub customer_name: Option<String>,
    /// Phone number from the first order seen
    pub phone_number: Option<String>,
    /// Sum of order totals
    pub total_spent: f64,
    /// Number of orders
    pub orders_count: u64,
}

/// Distinct customer ids, counted
#[must_use]
pub fn unique_customers_pipeline(predicate: Predicate) -> Pipeline {
    Pipeline::new()
        .matching(predicate)
        .group(
            Expr::null(),
            [("uniqueCustomers", Accumulator::add_to_set("customer.id"))],
        )
        .project([
            ("_id", Projection::Exclude),
            ("count", Projection::Computed(Expr::field("uniqueCustomers").size())),
        ])
}

/// Spend per customer, descending, top `limit`
#[must_use]
pub fn top_customers_pipeline(predicate: Predicate, limit: u64) -> Pipeline {
    Pipeline::new()
        .matching(predicate)
        .group(
            Expr::field("customer.id"),
            [
                ("customerName", Accumulator::first("customer.customerName")),
                ("phoneNumber", Accumulator::first("customer.phoneNumber")),
                ("total_spent", Accumulator::sum("total")),
                ("orders_count", Accumulator::count()),
            ],
        )
        .sort([("total_spent", SortOrder::Descending)])
        .limit(limit)
        .project([
            ("_id", Projection::Exclude),
            ("customer_id", Projection::Computed(Expr::field("_id").to_string_expr())),
            ("customerName", Projection::Include),
            ("phoneNumber", Projection::Include),
            ("total_spent", Projection::Include),
            ("orders_count", Projection::Include),
        ])
}

impl Metrics {
    /// Orders under the filter, reported as the customer total
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn total_customers(&self, filter: &Filter) -> MetricsResult<u64> {
        let predicate = filter.order_predicate(self.store()).await?;
        self.count(Collection::Orders, predicate, "total_customers")
            .await
    }

    /// Distinct customer identifiers across matching orders
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn unique_customers(&self, filter: &Filter) -> MetricsResult<u64> {
        let predicate = filter.order_predicate(self.store()).await?;
        let rows = self
            .run(
                Collection::Orders,
                &unique_customers_pipeline(predicate),
                "unique_customers",
            )
            .await?;
        Ok(rows.first().map_or(0, |row| row.u64_or_zero("count")))
    }

    /// Highest-spending customers; ties keep first-seen order
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn top_customers(&self, filter: &Filter, limit: u64) -> MetricsResult<Vec<TopCustomer>> {
        let predicate = filter.order_predicate(self.store()).await?;
        let rows = self
            .run(
                Collection::Orders,
                &top_customers_pipeline(predicate, limit),
                "top_customers",
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| TopCustomer {
                customer_id: row.str_or("customer_id", ""),
                customer_name: row.opt_string("customerName"),
                phone_number: row.opt_string("phoneNumber"),
                total_spent: round2(row.f64_or("total_spent", 0.0)),
                orders_count: row.u64_or_zero("orders_count"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unique_customers_renders_size() {
        let json = unique_customers_pipeline(Predicate::All).to_json();
        assert_eq!(
            json[2]["$project"]["count"],
            serde_json::json!({ "$size": "$uniqueCustomers" })
        );
    }

    #[test]
    fn top_customers_limits_after_sort() {
        let pipeline = top_customers_pipeline(Predicate::All, 3);
        let names: Vec<_> = pipeline.stages().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["$match", "$group", "$sort", "$limit", "$project"]);
    }
}
