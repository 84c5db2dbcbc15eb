//! Product rankings and inventory health
//!
//! - top and low sellers by units sold, joined with product, category and unit
//! - unsold products over a lookback window (anti-join against recent orders)
//! - low-stock listing and stock-alert candidates

use crate::engine::Metrics;
use crate::error::MetricsResult;
use crate::filter::{lookback, Filter, EXCLUDED_SALE_STATUSES};
use crate::normalize::{discount_percentage, rank, round2, RowExt, Urgency};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use shelf_store::{
    Accumulator, Collection, Expr, ObjectId, Pipeline, Predicate, Projection, SortOrder, Value,
};
use tracing::info;

/// Category label used when a product has no resolvable category
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Unit label used when a product has no resolvable unit
pub const DEFAULT_UNIT: &str = "Unit";

/// Number of products considered for stock alerts
pub const STOCK_ALERT_CANDIDATES: u64 = 5;

/// Direction of a sales ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesRanking {
    /// Most units sold first
    Top,
    /// Fewest units sold first
    Low,
}

impl SalesRanking {
    fn order(self) -> SortOrder {
        match self {
            SalesRanking::Top => SortOrder::Descending,
            SalesRanking::Low => SortOrder::Ascending,
        }
    }

    fn operation(self) -> &'static str {
        match self {
            SalesRanking::Top => "top_selling_products",
            SalesRanking::Low => "low_selling_products",
        }
    }
}

/// One ranked product with its sales figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSales {
    /// 1-based position in the ranking
    pub rank: u32,
    /// Product identifier
    pub product_id: String,
    /// Name from the first order line seen
    pub product_name: String,
    /// Category name
    pub category: String,
    /// Unit name
    pub unit: String,
    /// Sum of line quantities
    pub units_sold: f64,
    /// Order lines referencing the product
    pub total_orders: u64,
    /// Sum of line subtotals
    pub total_revenue: f64,
    /// MRP at time of sale
    pub mrp_price: f64,
    /// Offer price at time of sale
    pub offer_price: f64,
    /// `(mrp - offer) / mrp * 100`, 0 without MRP
    pub discount_percentage: f64,
    /// Current stock of the product
    pub current_stock: i64,
}

/// Product without sales in the lookback window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsoldProduct {
    /// 1-based position, oldest first
    pub rank: u32,
    /// Product identifier
    pub product_id: String,
    /// Product name
    pub product_name: String,
    /// Category name
    pub category: String,
    /// Unit name
    pub unit: String,
    /// Units in stock
    pub stock_quantity: i64,
    /// MRP
    pub mrp_price: f64,
    /// Offer price
    pub offer_price: f64,
    /// `stock_quantity * offer_price`
    pub stock_value: f64,
    /// Tax rate, 0 without tax reference
    pub tax_rate: f64,
    /// Whole days since creation
    pub days_in_inventory: i64,
    /// Staleness class
    pub urgency: Urgency,
}

/// Unsold products with totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsoldReport {
    /// Products, oldest first
    pub unsold_products: Vec<UnsoldProduct>,
    /// Number of unsold products
    pub total_products: usize,
    /// Sum of stock values
    pub total_stock_value: f64,
    /// Products classified critical
    pub critical_count: usize,
    /// Products classified high
    pub high_count: usize,
}

impl UnsoldReport {
    /// Products older than `days`
    #[must_use]
    pub fn aged_over(&self, days: i64) -> usize {
        self.unsold_products
            .iter()
            .filter(|p| p.days_in_inventory > days)
            .count()
    }
}

/// Product flagged unavailable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockProduct {
    /// Product identifier
    pub product_id: String,
    /// Product name
    pub product_name: String,
    /// Units in stock
    pub stock_quantity: i64,
    /// Category identifier, when set
    pub category_id: Option<String>,
    /// Category name
    pub category: String,
    /// Unit name
    pub unit: String,
    /// Offer price
    pub offer_price: f64,
}

/// Stock snapshot of one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockItem {
    /// Product identifier
    pub product_id: String,
    /// Product name
    pub product_name: String,
    /// Units in stock
    pub stock_quantity: i64,
    /// MRP
    pub mrp_price: f64,
    /// Offer price
    pub offer_price: f64,
    /// Point-of-sale price
    pub pos_price: f64,
    /// Last update, RFC 3339
    pub updated_at: Option<String>,
}

/// Units sold per product, ranked and joined with reference data
#[must_use]
pub fn sales_ranking_pipeline(predicate: Predicate, ranking: SalesRanking, limit: u64) -> Pipeline {
    Pipeline::new()
        .matching(predicate)
        .unwind("items")
        .group(
            Expr::field("items._id"),
            [
                ("product_name", Accumulator::first("items.productName")),
                ("units_sold", Accumulator::sum("items.quantity")),
                ("total_orders", Accumulator::count()),
                ("total_revenue", Accumulator::sum("items.subTotal")),
                ("mrp_price", Accumulator::first("items.mrpPrice")),
                ("offer_price", Accumulator::first("items.offerPrice")),
            ],
        )
        .sort([("units_sold", ranking.order())])
        .limit(limit)
        .join_one(Collection::Products, "_id", "product_info")
        .join_one(Collection::Categories, "product_info.category", "category_info")
        .join_one(Collection::Units, "product_info.unit", "unit_info")
}

/// Distinct product ids sold by store since `since`
#[must_use]
pub fn sold_product_ids_pipeline(store_id: ObjectId, since: DateTime<Utc>) -> Pipeline {
    Pipeline::new()
        .matching(Predicate::and([
            Predicate::eq("seller", store_id),
            Predicate::gte("createdAt", since),
            Predicate::not_in("status", EXCLUDED_SALE_STATUSES),
        ]))
        .unwind("items")
        .group(Expr::field("items._id"), Vec::<(String, Accumulator)>::new())
}

/// Approved, active products of store not in `sold`, oldest first
#[must_use]
pub fn unsold_products_pipeline(store_id: ObjectId, sold: Vec<Value>) -> Pipeline {
    Pipeline::new()
        .matching(Predicate::and([
            Predicate::eq("seller", store_id),
            Predicate::eq("status", "APPROVED"),
            Predicate::eq("stage", "ACTIVATE"),
            Predicate::Nin("_id".into(), sold),
        ]))
        .join_one(Collection::Categories, "category", "category_info")
        .join_one(Collection::Units, "unit", "unit_info")
        .join_one(Collection::Taxes, "tax", "tax_info")
        .sort([("createdAt", SortOrder::Ascending)])
}

/// Unavailable products of store, lowest stock first
#[must_use]
pub fn low_stock_pipeline(store_id: ObjectId, limit: u64) -> Pipeline {
    Pipeline::new()
        .matching(Predicate::and([
            Predicate::eq("seller", store_id),
            Predicate::eq("availabilityStatus", false),
        ]))
        .sort([("stockQuantity", SortOrder::Ascending)])
        .limit(limit)
        .join_one(Collection::Categories, "category", "category_info")
        .join_one(Collection::Units, "unit", "unit_info")
}

/// Highest-stock products of store, least recently updated first on ties
#[must_use]
pub fn stock_alert_pipeline(store_id: ObjectId) -> Pipeline {
    Pipeline::new()
        .matching(Predicate::eq("seller", store_id))
        .sort([
            ("stockQuantity", SortOrder::Descending),
            ("updatedAt", SortOrder::Ascending),
        ])
        .limit(STOCK_ALERT_CANDIDATES)
        .project([
            ("ProductName", Projection::Include),
            ("stockQuantity", Projection::Include),
            ("mrpPrice", Projection::Include),
            ("offerPrice", Projection::Include),
            ("posPrice", Projection::Include),
            ("updatedAt", Projection::Include),
        ])
}

impl Metrics {
    /// Best or worst sellers by units sold
    ///
    /// Without an explicit status, abandoned and cancelled orders are ignored.
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn product_sales(
        &self,
        filter: &Filter,
        ranking: SalesRanking,
        limit: u64,
    ) -> MetricsResult<Vec<ProductSales>> {
        info!(store_id = %filter.store_id, ?ranking, limit, "Ranking product sales");
        let predicate = filter.sales_predicate(self.store()).await?;
        let rows = self
            .run(
                Collection::Orders,
                &sales_ranking_pipeline(predicate, ranking, limit),
                ranking.operation(),
            )
            .await?;

        Ok(rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mrp = row.f64_or("mrp_price", row.f64_or("product_info.mrpPrice", 0.0));
                let offer = row.f64_or("offer_price", row.f64_or("product_info.offerPrice", 0.0));
                ProductSales {
                    rank: rank(i),
                    product_id: row.id_string("_id"),
                    product_name: row
                        .opt_string("product_name")
                        .or_else(|| row.opt_string("product_info.ProductName"))
                        .unwrap_or_default(),
                    category: row.str_or("category_info.name", UNCATEGORIZED),
                    unit: row.str_or("unit_info.name", DEFAULT_UNIT),
                    units_sold: row.f64_or("units_sold", 0.0),
                    total_orders: row.u64_or_zero("total_orders"),
                    total_revenue: round2(row.f64_or("total_revenue", 0.0)),
                    mrp_price: mrp,
                    offer_price: offer,
                    discount_percentage: discount_percentage(mrp, offer),
                    current_stock: row.i64_or("product_info.stockQuantity", 0),
                }
            })
            .collect())
    }

    /// Top sellers by units sold
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn top_selling_products(
        &self,
        filter: &Filter,
        limit: u64,
    ) -> MetricsResult<Vec<ProductSales>> {
        self.product_sales(filter, SalesRanking::Top, limit).await
    }

    /// Worst sellers by units sold
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn low_selling_products(
        &self,
        filter: &Filter,
        limit: u64,
    ) -> MetricsResult<Vec<ProductSales>> {
        self.product_sales(filter, SalesRanking::Low, limit).await
    }

    /// Approved, active products with no sale in the last `days` days
    ///
    /// Sold ids are read first and then excluded from the product scan. The
    /// two reads are not atomic.
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn unsold_products(
        &self,
        store_id: ObjectId,
        days: i64,
        now: DateTime<Utc>,
    ) -> MetricsResult<UnsoldReport> {
        info!(store_id = %store_id, days, "Finding unsold products");
        let since = lookback(now, days);
        let sold = self
            .run(
                Collection::Orders,
                &sold_product_ids_pipeline(store_id, since),
                "sold_product_ids",
            )
            .await?
            .into_iter()
            .filter_map(|mut row| row.remove("_id"))
            .collect();

        let rows = self
            .run(
                Collection::Products,
                &unsold_products_pipeline(store_id, sold),
                "unsold_products",
            )
            .await?;

        let unsold_products: Vec<UnsoldProduct> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let stock = row.i64_or("stockQuantity", 0);
                let offer = row.f64_or("offerPrice", 0.0);
                let days_in_inventory = row
                    .get_datetime("createdAt")
                    .map_or(0, |created| (now - created).num_days().max(0));
                #[allow(clippy::cast_precision_loss)]
                let stock_value = round2(stock as f64 * offer);
                UnsoldProduct {
                    rank: rank(i),
                    product_id: row.id_string("_id"),
                    product_name: row.str_or("ProductName", ""),
                    category: row.str_or("category_info.name", UNCATEGORIZED),
                    unit: row.str_or("unit_info.name", DEFAULT_UNIT),
                    stock_quantity: stock,
                    mrp_price: row.f64_or("mrpPrice", 0.0),
                    offer_price: offer,
                    stock_value,
                    tax_rate: row.f64_or("tax_info.rate", 0.0),
                    days_in_inventory,
                    urgency: Urgency::from_days(days_in_inventory),
                }
            })
            .collect();

        let count = |u: Urgency| unsold_products.iter().filter(|p| p.urgency == u).count();
        Ok(UnsoldReport {
            total_products: unsold_products.len(),
            total_stock_value: round2(unsold_products.iter().map(|p| p.stock_value).sum()),
            critical_count: count(Urgency::Critical),
            high_count: count(Urgency::High),
            unsold_products,
        })
    }

    /// Products flagged unavailable, lowest stock first
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn low_stock_products(
        &self,
        store_id: ObjectId,
        limit: u64,
    ) -> MetricsResult<Vec<LowStockProduct>> {
        let rows = self
            .run(
                Collection::Products,
                &low_stock_pipeline(store_id, limit),
                "low_stock_products",
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| LowStockProduct {
                product_id: row.id_string("_id"),
                product_name: row.str_or("ProductName", ""),
                stock_quantity: row.i64_or("stockQuantity", 0),
                category_id: Some(row.id_string("category")).filter(|c| !c.is_empty()),
                category: row.str_or("category_info.name", UNCATEGORIZED),
                unit: row.str_or("unit_info.name", DEFAULT_UNIT),
                offer_price: row.f64_or("offerPrice", 0.0),
            })
            .collect())
    }

    /// Candidates for stock alerts: highest stock, least recently updated first
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn stock_alert_candidates(&self, store_id: ObjectId) -> MetricsResult<Vec<StockItem>> {
        let rows = self
            .run(
                Collection::Products,
                &stock_alert_pipeline(store_id),
                "stock_alert_candidates",
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| StockItem {
                product_id: row.id_string("_id"),
                product_name: row.str_or("ProductName", ""),
                stock_quantity: row.i64_or("stockQuantity", 0),
                mrp_price: row.f64_or("mrpPrice", 0.0),
                offer_price: row.f64_or("offerPrice", 0.0),
                pos_price: row.f64_or("posPrice", 0.0),
                updated_at: row
                    .get_datetime("updatedAt")
                    .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ranking_sorts_before_joins() {
        let pipeline = sales_ranking_pipeline(Predicate::All, SalesRanking::Low, 5);
        let names: Vec<_> = pipeline.stages().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "$match", "$unwind", "$group", "$sort", "$limit", "$lookup", "$unwind", "$lookup",
                "$unwind", "$lookup", "$unwind"
            ]
        );
        assert_eq!(pipeline.to_json()[3]["$sort"]["units_sold"], 1);
    }

    #[test]
    fn unsold_excludes_sold_ids() {
        let store = ObjectId::generate();
        let sold = ObjectId::generate();
        let pipeline = unsold_products_pipeline(store, vec![Value::from(sold)]);
        let json = pipeline.to_json();
        let clauses = json[0]["$match"]["$and"].as_array().unwrap();
        assert!(clauses
            .iter()
            .any(|c| c["_id"]["$nin"][0]["$oid"] == sold.to_hex()));
    }

    #[test]
    fn aged_over_counts_strictly_older() {
        let product = |days| UnsoldProduct {
            rank: 1,
            product_id: String::new(),
            product_name: String::new(),
            category: UNCATEGORIZED.into(),
            unit: DEFAULT_UNIT.into(),
            stock_quantity: 0,
            mrp_price: 0.0,
            offer_price: 0.0,
            stock_value: 0.0,
            tax_rate: 0.0,
            days_in_inventory: days,
            urgency: Urgency::from_days(days),
        };
        let report = UnsoldReport {
            unsold_products: vec![product(10), product(30), product(31), product(90)],
            total_products: 4,
            total_stock_value: 0.0,
            critical_count: 1,
            high_count: 1,
        };
        assert_eq!(report.aged_over(30), 2);
    }
}
