//! Document store capability
//!
//! [`DocumentStore`] is the only seam between analytics code and the storage
//! engine. Implementations execute a [`Pipeline`] against a named
//! [`Collection`]; `count`, `find` and `find_one` are derived from it.

use crate::error::StoreResult;
use crate::pipeline::{Pipeline, SortOrder};
use crate::predicate::Predicate;
use crate::value::Document;
use async_trait::async_trait;
use std::fmt;

/// Collections read by the analytics engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// Customer orders
    Orders,
    /// Catalog products
    Products,
    /// Product categories
    Categories,
    /// Product subcategories
    SubCategories,
    /// Measurement units
    Units,
    /// Tax rates
    Taxes,
    /// Stores (sellers)
    Sellers,
    /// Payout ledger entries
    SellerPayoutTransactions,
}

impl Collection {
    /// Every collection
    pub const ALL: [Collection; 8] = [
        Collection::Orders,
        Collection::Products,
        Collection::Categories,
        Collection::SubCategories,
        Collection::Units,
        Collection::Taxes,
        Collection::Sellers,
        Collection::SellerPayoutTransactions,
    ];

    /// Storage name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Collection::Orders => "orders",
            Collection::Products => "products",
            Collection::Categories => "categories",
            Collection::SubCategories => "subCategories",
            Collection::Units => "units",
            Collection::Taxes => "taxes",
            Collection::Sellers => "sellers",
            Collection::SellerPayoutTransactions => "sellerpayouttransactions",
        }
    }

    /// Resolve storage name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options for [`DocumentStore::find`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Sort keys
    pub sort: Vec<(String, SortOrder)>,
    /// Documents to skip
    pub skip: u64,
    /// Maximum documents returned
    pub limit: Option<u64>,
}

impl FindOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add sort key
    #[must_use]
    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((field.into(), order));
        self
    }

    /// Set skip
    #[inline]
    #[must_use]
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Set limit
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn apply(&self, mut pipeline: Pipeline) -> Pipeline {
        if !self.sort.is_empty() {
            pipeline = pipeline.sort(self.sort.clone());
        }
        if self.skip > 0 {
            pipeline = pipeline.skip(self.skip);
        }
        if let Some(limit) = self.limit {
            pipeline = pipeline.limit(limit);
        }
        pipeline
    }
}

/// Read access to a document store
///
/// Implementations must be safe to share across tasks; the analytics engine
/// holds them as `Arc<dyn DocumentStore>`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Execute pipeline against collection
    async fn aggregate(&self, collection: Collection, pipeline: &Pipeline)
        -> StoreResult<Vec<Document>>;

    /// Count documents matching predicate
    async fn count(&self, collection: Collection, filter: &Predicate) -> StoreResult<u64> {
        let pipeline = Pipeline::new().matching(filter.clone()).count("count");
        let rows = self.aggregate(collection, &pipeline).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get_i64("count"))
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0))
    }

    /// Find documents matching predicate
    async fn find(
        &self,
        collection: Collection,
        filter: &Predicate,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        let pipeline = options.apply(Pipeline::new().matching(filter.clone()));
        self.aggregate(collection, &pipeline).await
    }

    /// First document matching predicate
    async fn find_one(
        &self,
        collection: Collection,
        filter: &Predicate,
    ) -> StoreResult<Option<Document>> {
        let options = FindOptions::new().with_limit(1);
        Ok(self
            .find(collection, filter, &options)
            .await?
            .into_iter()
            .next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names_roundtrip() {
        for collection in Collection::ALL {
            assert_eq!(Collection::from_name(collection.name()), Some(collection));
        }
        assert_eq!(Collection::from_name("customers"), None);
        assert_eq!(Collection::SubCategories.to_string(), "subCategories");
    }

    #[test]
    fn find_options_build_pipeline() {
        let options = FindOptions::new()
            .with_sort("stockQuantity", SortOrder::Ascending)
            .with_limit(5);
        let pipeline = options.apply(Pipeline::new().matching(Predicate::All));
        assert_eq!(pipeline.len(), 3);
    }
}
