//! Store directory and store performance

use crate::engine::Metrics;
use crate::error::{MetricsError, MetricsResult};
use crate::filter::lookback;
use crate::normalize::{percentage, round2, safe_ratio, to_json, RowExt};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shelf_store::{
    Accumulator, Collection, Document, Expr, ObjectId, Pipeline, Predicate, Projection, Value,
};
use tracing::info;

/// Window for the directory's recent-order count, in days
pub const RECENT_ORDER_DAYS: i64 = 30;

const UNKNOWN_STORE: &str = "Unknown Store";

/// Active store with catalog and order counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    /// Store identifier
    pub store_id: String,
    /// Display name
    pub store_name: String,
    /// Contact person
    pub contact_name: String,
    /// Phone number
    pub phone: String,
    /// Address as stored
    pub address: serde_json::Value,
    /// Outstanding payout balance
    pub payout_balance: f64,
    /// Approved products
    pub total_products: u64,
    /// Orders in the last 30 days
    pub recent_orders: u64,
}

/// Identity of a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreInfo {
    /// Display name
    pub store_name: String,
    /// Contact person
    pub contact_name: String,
    /// Outstanding payout balance
    pub payout_balance: f64,
}

/// Order outcomes, revenue and payouts over a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Orders in the period
    pub total_orders: u64,
    /// COMPLETED orders
    pub completed_orders: u64,
    /// Orders neither completed nor cancelled
    pub pending_orders: u64,
    /// CANCELLED or ABANDONED orders
    pub cancelled_orders: u64,
    /// Sum of order totals
    pub total_revenue: f64,
    /// Completed share of all orders, in percent
    pub completion_rate: f64,
    /// `total_revenue / total_orders`
    pub average_order_value: f64,
    /// Sum of payout transaction amounts
    pub total_commission: f64,
    /// Payout transactions in the period
    pub payout_transactions: u64,
}

/// Store identity with its performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorePerformance {
    /// Identity
    pub store_info: StoreInfo,
    /// Figures
    pub performance_metrics: PerformanceMetrics,
}

/// Orders and revenue per status
#[must_use]
pub fn orders_by_status_pipeline(predicate: Predicate) -> Pipeline {
    Pipeline::new().matching(predicate).group(
        Expr::field("status"),
        [
            ("count", Accumulator::count()),
            ("revenue", Accumulator::sum("total")),
        ],
    )
}

/// Payout transactions of store since `since`
///
/// Transactions reference the store by id string or by `ObjectId`, and carry
/// `createdAt` either as a date or as an ISO-8601 string.
#[must_use]
pub fn payouts_pipeline(store_id: ObjectId, since: DateTime<Utc>) -> Pipeline {
    let since_text = since.format("%Y-%m-%dT%H:%M:%S%.f").to_string();
    Pipeline::new()
        .matching(Predicate::and([
            Predicate::is_in("seller", [Value::from(store_id.to_hex()), Value::from(store_id)]),
            Predicate::or([
                Predicate::gte("createdAt", since),
                Predicate::gte("createdAt", since_text),
            ]),
        ]))
        .group(
            Expr::null(),
            [
                ("total", Accumulator::sum("amount")),
                ("count", Accumulator::count()),
            ],
        )
}

fn directory_pipeline() -> Pipeline {
    Pipeline::new()
        .matching(Predicate::and([
            Predicate::eq("status", "APPROVED"),
            Predicate::eq("isActive", true),
        ]))
        .project([
            ("storeName", Projection::Include),
            ("storeContactName", Projection::Include),
            ("phoneNumber", Projection::Include),
            ("address", Projection::Include),
            ("payoutBalance", Projection::Include),
        ])
}

impl Metrics {
    /// Approved, active stores with product and recent-order counts
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn stores(&self, now: DateTime<Utc>) -> MetricsResult<Vec<StoreSummary>> {
        let sellers = self
            .run(Collection::Sellers, &directory_pipeline(), "stores")
            .await?;
        info!(stores = sellers.len(), "Listing stores");

        let since = now - Duration::days(RECENT_ORDER_DAYS);
        let mut out = Vec::with_capacity(sellers.len());
        for seller in &sellers {
            let Some(id) = seller.get_object_id("_id") else {
                continue;
            };
            let total_products = self
                .count(
                    Collection::Products,
                    Predicate::and([Predicate::eq("seller", id), Predicate::eq("status", "APPROVED")]),
                    "store_products",
                )
                .await?;
            let recent_orders = self
                .count(
                    Collection::Orders,
                    Predicate::and([Predicate::eq("seller", id), Predicate::gte("createdAt", since)]),
                    "store_recent_orders",
                )
                .await?;
            out.push(StoreSummary {
                store_id: id.to_hex(),
                store_name: seller.str_or("storeName", UNKNOWN_STORE),
                contact_name: seller.str_or("storeContactName", ""),
                phone: seller.str_or("phoneNumber", ""),
                address: seller.get("address").map_or(serde_json::Value::String(String::new()), to_json),
                payout_balance: round2(seller.f64_or("payoutBalance", 0.0)),
                total_products,
                recent_orders,
            });
        }
        Ok(out)
    }

    /// Seller document of store
    ///
    /// # Errors
    /// - `NotFound` when the store does not exist
    /// - `DataAccess` on store failure
    pub async fn store_document(&self, store_id: ObjectId) -> MetricsResult<Document> {
        let pipeline = Pipeline::new()
            .matching(Predicate::eq("_id", store_id))
            .limit(1);
        self.run(Collection::Sellers, &pipeline, "store_lookup")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MetricsError::not_found("store", store_id.to_hex()))
    }

    /// Order outcomes, revenue and payouts of store over the last `days` days
    ///
    /// # Errors
    /// - `NotFound` when the store does not exist
    /// - `DataAccess` on store failure
    pub async fn store_performance(
        &self,
        store_id: ObjectId,
        days: i64,
        now: DateTime<Utc>,
    ) -> MetricsResult<StorePerformance> {
        info!(store_id = %store_id, days, "Computing store performance");
        let seller = self.store_document(store_id).await?;
        let since = lookback(now, days);

        let by_status = self
            .run(
                Collection::Orders,
                &orders_by_status_pipeline(Predicate::and([
                    Predicate::eq("seller", store_id),
                    Predicate::gte("createdAt", since),
                ])),
                "store_performance",
            )
            .await?;

        let (mut total, mut completed, mut cancelled, mut revenue) = (0u64, 0u64, 0u64, 0.0);
        for row in &by_status {
            let count = row.u64_or_zero("count");
            total += count;
            revenue += row.f64_or("revenue", 0.0);
            match row.get_str("_id") {
                Some("COMPLETED") => completed += count,
                Some("CANCELLED" | "ABANDONED") => cancelled += count,
                _ => {}
            }
        }

        let payouts = self
            .run(
                Collection::SellerPayoutTransactions,
                &payouts_pipeline(store_id, since),
                "store_payouts",
            )
            .await?;
        let (total_commission, payout_transactions) = payouts.first().map_or((0.0, 0), |row| {
            (row.f64_or("total", 0.0), row.u64_or_zero("count"))
        });

        #[allow(clippy::cast_precision_loss)]
        let total_f = total as f64;
        #[allow(clippy::cast_precision_loss)]
        let completion_rate = percentage(completed as f64, total_f);
        Ok(StorePerformance {
            store_info: StoreInfo {
                store_name: seller.str_or("storeName", UNKNOWN_STORE),
                contact_name: seller.str_or("storeContactName", ""),
                payout_balance: round2(seller.f64_or("payoutBalance", 0.0)),
            },
            performance_metrics: PerformanceMetrics {
                total_orders: total,
                completed_orders: completed,
                pending_orders: total - completed - cancelled,
                cancelled_orders: cancelled,
                total_revenue: round2(revenue),
                completion_rate,
                average_order_value: safe_ratio(revenue, total_f),
                total_commission: round2(total_commission),
                payout_transactions,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shelf_store::doc;

    #[test]
    fn payouts_match_either_seller_encoding() {
        let store = ObjectId::generate();
        let since = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let pipeline = payouts_pipeline(store, since);
        let shelf_store::Stage::Match(predicate) = &pipeline.stages()[0] else {
            panic!("first stage should match");
        };

        let as_text = doc! { "seller" => store.to_hex(), "createdAt" => "2025-01-02T08:00:00" };
        let as_id = doc! {
            "seller" => store,
            "createdAt" => Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap(),
        };
        let too_old = doc! { "seller" => store, "createdAt" => "2024-12-31T23:00:00" };
        assert!(predicate.matches(&as_text).unwrap());
        assert!(predicate.matches(&as_id).unwrap());
        assert!(!predicate.matches(&too_old).unwrap());
    }
}
