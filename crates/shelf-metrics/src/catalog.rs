//! Catalog reads backing the assistant flows
//!
//! - single product lookup scoped to a store
//! - same-category substitute candidates
//! - free-form product search and the categories of its results

use crate::engine::Metrics;
use crate::error::{MetricsError, MetricsResult};
use crate::normalize::RowExt;
use serde::{Deserialize, Serialize};
use shelf_store::{Collection, Document, ObjectId, Pipeline, Predicate};
use std::collections::HashSet;

/// Category label of candidates whose category cannot be resolved
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Catalog entry with prices and category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    /// Product identifier
    pub product_id: String,
    /// Product name
    pub product_name: String,
    /// MRP
    pub mrp_price: f64,
    /// Offer price
    pub offer_price: f64,
    /// Units in stock
    pub stock_quantity: i64,
    /// Category identifier, when set
    pub category_id: Option<ObjectId>,
    /// Resolved category name
    pub category_name: Option<String>,
}

impl CatalogProduct {
    /// Decode a product row, reading the category name from `category_info` when joined
    #[must_use]
    pub fn from_document(row: &Document) -> Self {
        Self {
            product_id: row.id_string("_id"),
            product_name: row.str_or("ProductName", "Unknown"),
            mrp_price: row.f64_or("mrpPrice", 0.0),
            offer_price: row.f64_or("offerPrice", 0.0),
            stock_quantity: row.i64_or("stockQuantity", 0),
            category_id: row.get_object_id("category"),
            category_name: row.opt_string("category_info.name"),
        }
    }
}

/// Approved products of store sharing `original`'s category, excluding it
#[must_use]
pub fn substitute_candidates_pipeline(
    store_id: ObjectId,
    original_id: ObjectId,
    category: Option<ObjectId>,
    cap: u64,
) -> Pipeline {
    let mut clauses = vec![
        Predicate::eq("seller", store_id),
        Predicate::eq("status", "APPROVED"),
        Predicate::ne("_id", original_id),
    ];
    if let Some(category) = category {
        clauses.push(Predicate::eq("category", category));
    }
    Pipeline::new()
        .matching(Predicate::and(clauses))
        .limit(cap)
        .join_one(Collection::Categories, "category", "category_info")
}

impl Metrics {
    /// Product of store by id
    ///
    /// # Errors
    /// - `NotFound` when the store has no such product
    /// - `DataAccess` on store failure
    pub async fn product(&self, store_id: ObjectId, product_id: ObjectId) -> MetricsResult<CatalogProduct> {
        let pipeline = Pipeline::new()
            .matching(Predicate::and([
                Predicate::eq("_id", product_id),
                Predicate::eq("seller", store_id),
            ]))
            .limit(1)
            .join_one(Collection::Categories, "category", "category_info");
        self.run(Collection::Products, &pipeline, "product_lookup")
            .await?
            .first()
            .map(CatalogProduct::from_document)
            .ok_or_else(|| MetricsError::not_found("product", product_id.to_hex()))
    }

    /// Up to `cap` substitute candidates for `original`
    ///
    /// # Errors
    /// - `InvalidIdentifier` when `original` does not carry a valid id
    /// - `DataAccess` on store failure
    pub async fn substitute_candidates(
        &self,
        store_id: ObjectId,
        original: &CatalogProduct,
        cap: u64,
    ) -> MetricsResult<Vec<CatalogProduct>> {
        let original_id = ObjectId::parse_str(&original.product_id)
            .map_err(|_| MetricsError::invalid_identifier("product_id", &original.product_id))?;
        let rows = self
            .run(
                Collection::Products,
                &substitute_candidates_pipeline(store_id, original_id, original.category_id, cap),
                "substitute_candidates",
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| {
                let mut product = CatalogProduct::from_document(row);
                if product.category_id.is_some() && product.category_name.is_none() {
                    product.category_name = Some(UNKNOWN_CATEGORY.to_string());
                }
                product
            })
            .collect())
    }

    /// Products matching `predicate`, at most `limit`
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn search_products(&self, predicate: Predicate, limit: u64) -> MetricsResult<Vec<Document>> {
        let pipeline = Pipeline::new().matching(predicate).limit(limit);
        self.run(Collection::Products, &pipeline, "search_products")
            .await
    }

    /// Distinct categories referenced by `products`, in first-reference order
    ///
    /// # Errors
    /// `DataAccess` on store failure
    pub async fn categories_of(&self, products: &[Document]) -> MetricsResult<Vec<Document>> {
        let mut seen = HashSet::new();
        let ids: Vec<ObjectId> = products
            .iter()
            .filter_map(|p| p.get_object_id("category"))
            .filter(|id| seen.insert(*id))
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let pipeline = Pipeline::new().matching(Predicate::is_in("_id", ids.iter().copied()));
        let mut found = self
            .run(Collection::Categories, &pipeline, "categories_of")
            .await?;
        found.sort_by_key(|c| {
            c.get_object_id("_id")
                .and_then(|id| ids.iter().position(|x| *x == id))
                .unwrap_or(usize::MAX)
        });
        Ok(found)
    }
}
