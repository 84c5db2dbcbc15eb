//! Paginated recent-order listing
//!
//! One `$facet` pass returns the requested page and the total count of the
//! same predicate, so the two always agree.

use crate::engine::Metrics;
use crate::error::{MetricsError, MetricsResult};
use crate::filter::Filter;
use crate::normalize::RowExt;
use serde::{Deserialize, Serialize};
use shelf_store::{Collection, Document, Pipeline, Predicate, SortOrder, Value};
use tracing::info;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Page request for recent orders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentOrdersQuery {
    /// 1-based page number
    pub page: i64,
    /// Orders per page
    pub limit: i64,
    /// Case-insensitive substring of order number, customer name or phone
    #[serde(default)]
    pub search: Option<String>,
    /// Exact order type
    #[serde(default)]
    pub order_type: Option<String>,
}

impl RecentOrdersQuery {
    /// First page of `limit` orders
    #[must_use]
    pub fn new(limit: i64) -> Self {
        Self {
            page: 1,
            limit,
            search: None,
            order_type: None,
        }
    }

    /// Set page number
    #[must_use]
    pub fn with_page(mut self, page: i64) -> Self {
        self.page = page;
        self
    }

    /// Set search text
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Set order type
    #[must_use]
    pub fn with_order_type(mut self, order_type: impl Into<String>) -> Self {
        self.order_type = Some(order_type.into());
        self
    }

    /// Validated `(skip, limit)`
    ///
    /// # Errors
    /// `InvalidPagination` when page or limit is not positive
    pub fn window(&self) -> MetricsResult<(u64, u64)> {
        match (u64::try_from(self.page), u64::try_from(self.limit)) {
            (Ok(page), Ok(limit)) if page > 0 && limit > 0 => {
                Ok(((page - 1).saturating_mul(limit), limit))
            }
            _ => Err(MetricsError::InvalidPagination {
                page: self.page,
                limit: self.limit,
            }),
        }
    }
}

/// Page position and totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Requested page
    pub current_page: u64,
    /// Page size
    pub per_page: u64,
    /// Orders across all pages
    pub total_items: u64,
    /// `ceil(total_items / per_page)`
    pub total_pages: u64,
    /// A later page exists
    pub has_next: bool,
    /// An earlier page exists
    pub has_previous: bool,
}

impl Pagination {
    /// Compute position of page `current_page` of size `per_page`
    #[must_use]
    pub fn new(current_page: u64, per_page: u64, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(per_page.max(1));
        Self {
            current_page,
            per_page,
            total_items,
            total_pages,
            has_next: current_page < total_pages,
            has_previous: current_page > 1,
        }
    }
}

/// Customer of an order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCustomer {
    /// Display name
    pub name: Option<String>,
    /// Phone number
    pub phone: Option<String>,
}

/// One line of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Product name at time of sale
    pub name: Option<String>,
    /// Units
    pub quantity: f64,
    /// Unit offer price
    pub price: f64,
    /// Line subtotal
    pub subtotal: f64,
}

/// Monetary totals of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAmount {
    /// Sum of line subtotals
    pub subtotal: f64,
    /// Grand total
    pub total: f64,
    /// Amount received
    pub amount_received: f64,
    /// Extra charges
    pub charges: f64,
}

/// Delivery details of an order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    /// Delivery type
    pub delivery_type: Option<String>,
    /// Formatted delivery address
    pub delivery_address: Option<String>,
}

/// Order as listed in recent orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    /// Order number
    pub order_no: Option<String>,
    /// Invoice number
    pub invoice_no: Option<String>,
    /// Customer
    pub customer: OrderCustomer,
    /// Creation time, `YYYY-MM-DD HH:MM:SS`
    pub created_at: Option<String>,
    /// Delivery time, `YYYY-MM-DD HH:MM:SS`
    pub delivered_at: Option<String>,
    /// Lines
    pub items: Vec<OrderLine>,
    /// Number of lines
    pub items_count: usize,
    /// Totals
    pub amount: OrderAmount,
    /// Delivery
    pub delivery: DeliveryInfo,
    /// Status
    pub status: Option<String>,
    /// Order type
    pub order_type: Option<String>,
    /// Payment method
    pub payment_method: Option<String>,
}

impl OrderSummary {
    /// Decode a stored order
    #[must_use]
    pub fn from_document(order: &Document) -> Self {
        let timestamp = |path: &str| {
            order
                .get_datetime(path)
                .map(|at| at.format(TIMESTAMP_FORMAT).to_string())
        };
        let items: Vec<OrderLine> = order
            .get_array("items")
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_document)
            .map(|line| OrderLine {
                name: line.opt_string("productName"),
                quantity: line.f64_or("quantity", 0.0),
                price: line.f64_or("offerPrice", 0.0),
                subtotal: line.f64_or("subTotal", 0.0),
            })
            .collect();

        Self {
            order_no: order.opt_string("orderNo"),
            invoice_no: order.opt_string("invoiceNo"),
            customer: OrderCustomer {
                name: order.opt_string("customer.customerName"),
                phone: order.opt_string("customer.phoneNumber"),
            },
            created_at: timestamp("createdAt"),
            delivered_at: timestamp("deliveredAt"),
            items_count: items.len(),
            items,
            amount: OrderAmount {
                subtotal: order.f64_or("subTotal", 0.0),
                total: order.f64_or("total", 0.0),
                amount_received: order.f64_or("amountReceived", 0.0),
                charges: order.f64_or("charges", 0.0),
            },
            delivery: DeliveryInfo {
                delivery_type: order.opt_string("deliveryType"),
                delivery_address: order
                    .opt_string("shippingInfo.delivery.address.formatted_address"),
            },
            status: order.opt_string("status"),
            order_type: order.opt_string("orderType"),
            payment_method: order.opt_string("paymentMethod"),
        }
    }
}

/// One page of recent orders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentOrders {
    /// Page position
    pub pagination: Pagination,
    /// Orders, newest first
    pub orders: Vec<OrderSummary>,
}

/// Search across order number, customer name and phone
#[must_use]
pub fn search_predicate(text: &str) -> Predicate {
    Predicate::or([
        Predicate::contains_ignore_case("orderNo", text),
        Predicate::contains_ignore_case("customer.customerName", text),
        Predicate::contains_ignore_case("customer.phoneNumber", text),
    ])
}

/// Newest first, page slice and total count in one pass
#[must_use]
pub fn recent_orders_pipeline(predicate: Predicate, skip: u64, limit: u64) -> Pipeline {
    Pipeline::new()
        .matching(predicate)
        .sort([("createdAt", SortOrder::Descending)])
        .facet([
            ("orders", Pipeline::new().skip(skip).limit(limit)),
            ("total_count", Pipeline::new().count("count")),
        ])
}

impl Metrics {
    /// One page of orders, newest first
    ///
    /// # Errors
    /// - `InvalidPagination` when page or limit is not positive
    /// - `DataAccess` on store failure
    pub async fn recent_orders(
        &self,
        filter: &Filter,
        query: &RecentOrdersQuery,
    ) -> MetricsResult<RecentOrders> {
        let (skip, limit) = query.window()?;
        info!(store_id = %filter.store_id, page = query.page, limit, "Listing recent orders");

        let mut predicate = filter.order_predicate(self.store()).await?;
        if let Some(order_type) = query.order_type.as_deref().filter(|t| !t.trim().is_empty()) {
            predicate = predicate.and_also(Predicate::eq("orderType", order_type));
        }
        if let Some(text) = query.search.as_deref().filter(|t| !t.trim().is_empty()) {
            predicate = predicate.and_also(search_predicate(text));
        }

        let rows = self
            .run(
                Collection::Orders,
                &recent_orders_pipeline(predicate, skip, limit),
                "recent_orders",
            )
            .await?;
        let facet = rows.first();
        let orders = facet
            .and_then(|row| row.get_array("orders"))
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_document)
            .map(OrderSummary::from_document)
            .collect();
        let total_items = facet
            .and_then(|row| row.get_array("total_count"))
            .and_then(|counts| counts.first())
            .and_then(Value::as_document)
            .map_or(0, |count| count.u64_or_zero("count"));

        Ok(RecentOrders {
            pagination: Pagination::new(skip / limit + 1, limit, total_items),
            orders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shelf_store::doc;

    #[test]
    fn pagination_math() {
        let last = Pagination::new(3, 10, 25);
        assert_eq!(last.total_pages, 3);
        assert!(!last.has_next);
        assert!(last.has_previous);

        let first = Pagination::new(1, 10, 25);
        assert!(first.has_next);
        assert!(!first.has_previous);

        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
    }

    #[test]
    fn window_rejects_non_positive() {
        assert_eq!(RecentOrdersQuery::new(10).with_page(3).window().unwrap(), (20, 10));
        assert!(matches!(
            RecentOrdersQuery::new(0).window(),
            Err(MetricsError::InvalidPagination { page: 1, limit: 0 })
        ));
        assert!(RecentOrdersQuery::new(10).with_page(-1).window().is_err());
    }

    #[test]
    fn search_escapes_pattern() {
        let predicate = search_predicate("+91 98");
        let hit = doc! { "customer" => doc! { "phoneNumber" => "+91 9876543210" } };
        assert!(predicate.matches(&hit).unwrap());
        assert!(!predicate.matches(&doc! { "orderNo" => "A-1" }).unwrap());
    }

    #[test]
    fn decodes_order_lines() {
        let order = doc! {
            "orderNo" => "ORD-7",
            "items" => vec![
                Value::from(doc! { "productName" => "Rice", "quantity" => 2, "subTotal" => 120.0 }),
            ],
            "total" => 130.0,
        };
        let summary = OrderSummary::from_document(&order);
        assert_eq!(summary.items_count, 1);
        assert_eq!(summary.items[0].quantity, 2.0);
        assert_eq!(summary.amount.total, 130.0);
        assert_eq!(summary.customer, OrderCustomer::default());
    }
}
