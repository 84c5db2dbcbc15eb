//! Filter Builder
//!
//! Turns the common request parameters (store, date range, status, category)
//! into store match predicates:
//! - `seller == store_id`
//! - `createdAt >= date_from` and `createdAt <= date_to` (both inclusive)
//! - `status == status`
//! - category: products match `category` or `subCategory`; orders match
//!   line items referencing any product of the category
//!
//! The order-side category clause reads the category's product ids first and
//! then filters orders by membership. The two reads are not atomic.

use crate::engine::run;
use crate::error::{MetricsError, MetricsResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shelf_store::{
    parse_datetime, Collection, DocumentStore, ObjectId, Pipeline, Predicate, Projection, Value,
};

/// Order statuses excluded from sales rankings by default
pub const EXCLUDED_SALE_STATUSES: [&str; 2] = ["ABANDONED", "CANCELLED"];

/// Start of a lookback window of `days` days ending at `now`
///
/// Windows reaching past the representable range start at the earliest
/// representable instant.
#[must_use]
pub fn lookback(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Raw filter parameters as received from a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Store identifier (24 hex chars)
    pub store_id: String,
    /// Inclusive lower bound on creation time
    #[serde(default)]
    pub date_from: Option<String>,
    /// Inclusive upper bound on creation time
    #[serde(default)]
    pub date_to: Option<String>,
    /// Exact status
    #[serde(default)]
    pub status: Option<String>,
    /// Category identifier
    #[serde(default)]
    pub category_id: Option<String>,
}

impl FilterParams {
    /// Create parameters for store
    #[must_use]
    pub fn new(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            ..Self::default()
        }
    }

    /// Set lower date bound
    #[must_use]
    pub fn with_date_from(mut self, date: impl Into<String>) -> Self {
        self.date_from = Some(date.into());
        self
    }

    /// Set upper date bound
    #[must_use]
    pub fn with_date_to(mut self, date: impl Into<String>) -> Self {
        self.date_to = Some(date.into());
        self
    }

    /// Set status
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set category
    #[must_use]
    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }
}

/// Validated filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Owning store
    pub store_id: ObjectId,
    /// Inclusive lower bound on `createdAt`
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `createdAt`
    pub date_to: Option<DateTime<Utc>>,
    /// Exact status
    pub status: Option<String>,
    /// Category (or subcategory) restriction
    pub category_id: Option<ObjectId>,
}

impl Filter {
    /// Filter on store only
    #[must_use]
    pub fn new(store_id: ObjectId) -> Self {
        Self {
            store_id,
            date_from: None,
            date_to: None,
            status: None,
            category_id: None,
        }
    }

    /// Validate raw parameters
    ///
    /// Blank optional parameters count as absent.
    ///
    /// # Errors
    /// - `InvalidIdentifier` for malformed store or category ids
    /// - `InvalidDateFormat` for unparseable dates
    pub fn parse(params: &FilterParams) -> MetricsResult<Self> {
        Ok(Self {
            store_id: parse_object_id("store_id", &params.store_id)?,
            date_from: non_blank(params.date_from.as_deref())
                .map(|d| parse_date("date_from", d))
                .transpose()?,
            date_to: non_blank(params.date_to.as_deref())
                .map(|d| parse_date("date_to", d))
                .transpose()?,
            status: non_blank(params.status.as_deref()).map(str::to_string),
            category_id: non_blank(params.category_id.as_deref())
                .map(|c| parse_object_id("category_id", c))
                .transpose()?,
        })
    }

    /// Set lower date bound
    #[inline]
    #[must_use]
    pub fn with_date_from(mut self, date: DateTime<Utc>) -> Self {
        self.date_from = Some(date);
        self
    }

    /// Set upper date bound
    #[inline]
    #[must_use]
    pub fn with_date_to(mut self, date: DateTime<Utc>) -> Self {
        self.date_to = Some(date);
        self
    }

    /// Set status
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set category
    #[inline]
    #[must_use]
    pub fn with_category(mut self, category_id: ObjectId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Default the lower bound to `now - days` when none was given
    #[must_use]
    pub fn or_since_days(mut self, now: DateTime<Utc>, days: i64) -> Self {
        if self.date_from.is_none() {
            self.date_from = Some(lookback(now, days));
        }
        self
    }

    /// `seller == store_id`
    #[must_use]
    pub fn store_predicate(&self) -> Predicate {
        Predicate::eq("seller", self.store_id)
    }

    /// Store, status and date range clauses
    #[must_use]
    pub fn base_predicate(&self) -> Predicate {
        let mut clauses = vec![self.store_predicate()];
        if let Some(status) = &self.status {
            clauses.push(Predicate::eq("status", status.as_str()));
        }
        if let Some(from) = self.date_from {
            clauses.push(Predicate::gte("createdAt", from));
        }
        if let Some(to) = self.date_to {
            clauses.push(Predicate::lte("createdAt", to));
        }
        Predicate::and(clauses)
    }

    /// Predicate over the product collection
    #[must_use]
    pub fn product_predicate(&self) -> Predicate {
        let base = self.base_predicate();
        match self.category_id {
            Some(category) => base.and_also(Predicate::or([
                Predicate::eq("category", category),
                Predicate::eq("subCategory", category),
            ])),
            None => base,
        }
    }

    /// Predicate over the order collection
    ///
    /// # Errors
    /// `DataAccess` when the category membership read fails
    pub async fn order_predicate(&self, store: &dyn DocumentStore) -> MetricsResult<Predicate> {
        let base = self.base_predicate();
        let Some(category) = self.category_id else {
            return Ok(base);
        };
        let product_ids = category_product_ids(store, category).await?;
        Ok(base.and_also(Predicate::In("items._id".into(), product_ids)))
    }

    /// Order predicate excluding abandoned and cancelled orders unless a status was given
    ///
    /// # Errors
    /// `DataAccess` when the category membership read fails
    pub async fn sales_predicate(&self, store: &dyn DocumentStore) -> MetricsResult<Predicate> {
        let predicate = self.order_predicate(store).await?;
        Ok(if self.status.is_some() {
            predicate
        } else {
            predicate.and_also(Predicate::not_in("status", EXCLUDED_SALE_STATUSES))
        })
    }
}

/// Ids of products whose `category` is `category`
///
/// Unlike [`Filter::product_predicate`], `subCategory` is not consulted, so a
/// subcategory id counts products but selects no orders.
async fn category_product_ids(
    store: &dyn DocumentStore,
    category: ObjectId,
) -> MetricsResult<Vec<Value>> {
    let pipeline = Pipeline::new()
        .matching(Predicate::eq("category", category))
        .project([("_id", Projection::Include)]);
    let rows = run(store, Collection::Products, &pipeline, "category_membership").await?;
    Ok(rows
        .into_iter()
        .filter_map(|mut row| row.remove("_id"))
        .collect())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse an identifier parameter
///
/// # Errors
/// `MetricsError::InvalidIdentifier` when the text is not 24 hex characters
pub fn parse_object_id(field: &'static str, text: &str) -> MetricsResult<ObjectId> {
    ObjectId::parse_str(text.trim()).map_err(|_| MetricsError::invalid_identifier(field, text))
}

/// Parse an ISO-8601 date or date-time parameter (naive values are UTC)
///
/// # Errors
/// `MetricsError::InvalidDateFormat` when the text is not a recognised date
pub fn parse_date(field: &'static str, text: &str) -> MetricsResult<DateTime<Utc>> {
    parse_datetime(text).ok_or_else(|| MetricsError::invalid_date(field, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shelf_store::doc;

    const STORE: &str = "64b7f0c2a1b2c3d4e5f60718";

    #[test]
    fn parses_params() {
        let params = FilterParams::new(STORE)
            .with_date_from("2025-01-01")
            .with_date_to("2025-01-31T23:59:59")
            .with_status("COMPLETED")
            .with_category(" ");
        let filter = Filter::parse(&params).unwrap();
        assert_eq!(filter.store_id.to_hex(), STORE);
        assert_eq!(
            filter.date_from,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(filter.status.as_deref(), Some("COMPLETED"));
        assert!(filter.category_id.is_none());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            Filter::parse(&FilterParams::new("store-1")),
            Err(MetricsError::InvalidIdentifier { field: "store_id", .. })
        ));
        assert!(matches!(
            Filter::parse(&FilterParams::new(STORE).with_date_to("31/01/2025")),
            Err(MetricsError::InvalidDateFormat { field: "date_to", .. })
        ));
        assert!(matches!(
            Filter::parse(&FilterParams::new(STORE).with_category("xyz")),
            Err(MetricsError::InvalidIdentifier { field: "category_id", .. })
        ));
    }

    #[test]
    fn base_predicate_restricts_store_and_range() {
        let store = ObjectId::parse_str(STORE).unwrap();
        let jan = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let filter = Filter::new(store)
            .with_date_from(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
            .with_date_to(Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap());
        let predicate = filter.base_predicate();

        assert!(predicate.matches(&doc! { "seller" => store, "createdAt" => jan }).unwrap());
        assert!(!predicate
            .matches(&doc! { "seller" => ObjectId::generate(), "createdAt" => jan })
            .unwrap());
    }

    #[test]
    fn product_predicate_matches_subcategory() {
        let store = ObjectId::parse_str(STORE).unwrap();
        let category = ObjectId::generate();
        let predicate = Filter::new(store).with_category(category).product_predicate();
        assert!(predicate
            .matches(&doc! { "seller" => store, "subCategory" => category })
            .unwrap());
        assert!(!predicate
            .matches(&doc! { "seller" => store, "category" => ObjectId::generate() })
            .unwrap());
    }

    #[test]
    fn or_since_days_keeps_explicit_bound() {
        let store = ObjectId::parse_str(STORE).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap();
        let explicit = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();

        let defaulted = Filter::new(store).or_since_days(now, 30);
        assert_eq!(defaulted.date_from, Some(now - Duration::days(30)));

        let kept = Filter::new(store).with_date_from(explicit).or_since_days(now, 30);
        assert_eq!(kept.date_from, Some(explicit));
    }

    #[test]
    fn lookback_saturates_on_huge_windows() {
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 0, 0, 0).unwrap();
        assert_eq!(lookback(now, 0), now);
        assert_eq!(lookback(now, 31), Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap());
        assert_eq!(lookback(now, 1_000_000_000_000), DateTime::<Utc>::MIN_UTC);
        assert_eq!(lookback(now, i64::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(
            Filter::new(ObjectId::parse_str(STORE).unwrap())
                .or_since_days(now, 1_000_000_000_000)
                .date_from,
            Some(DateTime::<Utc>::MIN_UTC)
        );
    }
}
