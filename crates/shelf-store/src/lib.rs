//! Shelf Store - document model and aggregation capability
//!
//! The storage seam of the analytics engine:
//! - Stored values (`Value`, `Document`, `ObjectId`) with extended JSON I/O
//! - Typed match predicates and aggregation stages
//! - The `DocumentStore` capability consumed by metric pipelines
//! - `MemoryStore`, an in-process executor of the stage language
//!
//! # Example
//!
//! ```rust,ignore
//! use shelf_store::prelude::*;
//!
//! # async fn example() -> Result<(), StoreError> {
//! let store = MemoryStore::new().with_documents(
//!     Collection::Orders,
//!     vec![doc! { "status" => "COMPLETED", "total" => 120.0 }],
//! );
//!
//! let pipeline = Pipeline::new()
//!     .matching(Predicate::eq("status", "COMPLETED"))
//!     .group(Expr::null(), [("revenue", Accumulator::sum("total"))]);
//! let rows = store.aggregate(Collection::Orders, &pipeline).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod error;
mod eval;
pub mod memory;
pub mod pipeline;
pub mod predicate;
pub mod store;
pub mod value;

pub use error::{ObjectIdError, StoreError, StoreResult};
pub use memory::MemoryStore;
pub use pipeline::{Accumulator, Expr, Pipeline, Projection, SortOrder, Stage};
pub use predicate::Predicate;
pub use store::{Collection, DocumentStore, FindOptions};
pub use value::{parse_datetime, Document, ObjectId, Value};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building and running pipelines
    pub use crate::{
        doc, Accumulator, Collection, Document, DocumentStore, Expr, FindOptions, MemoryStore,
        ObjectId, Pipeline, Predicate, Projection, SortOrder, StoreError, StoreResult, Value,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
