//! Category rollups over order line items

use crate::engine::Metrics;
use crate::error::MetricsResult;
use crate::filter::Filter;
use crate::normalize::{percentage, rank, round2, RowExt};
use crate::products::UNCATEGORIZED;
use serde::{Deserialize, Serialize};
use shelf_store::{Accumulator, Collection, Expr, Pipeline, Predicate, Projection, SortOrder};
use tracing::info;

/// Subcategory names reported per category
pub const MAX_SUBCATEGORIES: usize = 5;

/// Line-item totals of one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    /// Category identifier
    pub category_id: String,
    /// Category name
    pub category_name: String,
    /// Distinct products sold
    pub product_count: u64,
    /// Order lines in the category
    pub order_count: u64,
    /// Sum of line subtotals
    pub total_revenue: f64,
    /// Sum of line quantities
    pub total_quantity: f64,
}

/// Category distribution with the number of categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDistribution {
    /// Categories present
    pub total_categories: usize,
    /// Categories by order lines, descending
    pub categories: Vec<CategoryShare>,
}

/// Category ranked by sales
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySales {
    /// 1-based position
    pub rank: u32,
    /// Category name
    pub category_name: String,
    /// Sum of line subtotals
    pub total_sales: f64,
    /// Sum of line quantities
    pub units_sold: f64,
    /// Share of all category sales
    pub percentage: f64,
    /// Up to five subcategory names seen
    pub subcategories: Vec<String>,
}

/// Line items joined to product and category, grouped per category
///
/// Lines whose product or category cannot be resolved are dropped.
#[must_use]
pub fn category_distribution_pipeline(predicate: Predicate) -> Pipeline {
    Pipeline::new()
        .matching(predicate)
        .unwind("items")
        .lookup(Collection::Products, "items._id", "_id", "product_info")
        .unwind("product_info")
        .lookup(Collection::Categories, "product_info.category", "_id", "category_info")
        .unwind("category_info")
        .group(
            Expr::field("product_info.category"),
            [
                ("category_name", Accumulator::first("category_info.name")),
                ("product_count", Accumulator::add_to_set("items._id")),
                ("order_count", Accumulator::count()),
                ("total_revenue", Accumulator::sum("items.subTotal")),
                ("total_quantity", Accumulator::sum("items.quantity")),
            ],
        )
        .project([
            ("_id", Projection::Exclude),
            ("category_id", Projection::Computed(Expr::field("_id").to_string_expr())),
            ("category_name", Projection::Include),
            ("product_count", Projection::Computed(Expr::field("product_count").size())),
            ("order_count", Projection::Include),
            ("total_revenue", Projection::Computed(Expr::field("total_revenue").round(2))),
            ("total_quantity", Projection::Include),
        ])
        .sort([("order_count", SortOrder::Descending)])
}

/// Sales per category with subcategory names, descending
#[must_use]
pub fn category_sales_pipeline(predicate: Predicate) -> Pipeline {
    Pipeline::new()
        .matching(predicate)
        .unwind("items")
        .join_one(Collection::Products, "items._id", "product")
        .join_one(Collection::Categories, "product.category", "category")
        .join_one(Collection::SubCategories, "product.subCategory", "subcategory")
        .group(
            Expr::field("category._id"),
            [
                ("category_name", Accumulator::first("category.name")),
                ("total_sales", Accumulator::sum("items.subTotal")),
                ("units_sold", Accumulator::sum("items.quantity")),
                ("subcategories", Accumulator::add_to_set("subcategory.name")),
            ],
        )
        .sort([("total_sales", SortOrder::Descending)])
}

impl Metrics {
    /// Distinct products, order lines, revenue and quantity per category
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn category_distribution(&self, filter: &Filter) -> MetricsResult<CategoryDistribution> {
        info!(store_id = %filter.store_id, "Computing category distribution");
        let predicate = filter.order_predicate(self.store()).await?;
        let rows = self
            .run(
                Collection::Orders,
                &category_distribution_pipeline(predicate),
                "category_distribution",
            )
            .await?;
        let categories: Vec<CategoryShare> = rows
            .iter()
            .map(|row| CategoryShare {
                category_id: row.str_or("category_id", ""),
                category_name: row.str_or("category_name", UNCATEGORIZED),
                product_count: row.u64_or_zero("product_count"),
                order_count: row.u64_or_zero("order_count"),
                total_revenue: row.f64_or("total_revenue", 0.0),
                total_quantity: row.f64_or("total_quantity", 0.0),
            })
            .collect();
        Ok(CategoryDistribution {
            total_categories: categories.len(),
            categories,
        })
    }

    /// Categories ranked by sales with their share of the total
    ///
    /// Without an explicit status, abandoned and cancelled orders are ignored.
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn category_sales(&self, filter: &Filter) -> MetricsResult<Vec<CategorySales>> {
        let predicate = filter.sales_predicate(self.store()).await?;
        let rows = self
            .run(
                Collection::Orders,
                &category_sales_pipeline(predicate),
                "category_sales",
            )
            .await?;
        let grand_total: f64 = rows.iter().map(|row| row.f64_or("total_sales", 0.0)).sum();

        Ok(rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let sales = row.f64_or("total_sales", 0.0);
                CategorySales {
                    rank: rank(i),
                    category_name: row.str_or("category_name", UNCATEGORIZED),
                    total_sales: round2(sales),
                    units_sold: row.f64_or("units_sold", 0.0),
                    percentage: percentage(sales, grand_total),
                    subcategories: row
                        .get_array("subcategories")
                        .unwrap_or_default()
                        .iter()
                        .filter_map(|v| v.as_str())
                        .filter(|name| !name.is_empty())
                        .take(MAX_SUBCATEGORIES)
                        .map(str::to_string)
                        .collect(),
                }
            })
            .collect())
    }
}
