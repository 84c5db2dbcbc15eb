//! Pipeline execution against an injected store

use crate::error::{MetricsError, MetricsResult};
use shelf_store::{Collection, Document, DocumentStore, Pipeline, Predicate};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Metric pipelines bound to a document store
///
/// Cheap to clone; every operation is a stateless read.
#[derive(Clone)]
pub struct Metrics {
    store: Arc<dyn DocumentStore>,
}

impl Metrics {
    /// Create metrics over store
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub(crate) async fn run(
        &self,
        collection: Collection,
        pipeline: &Pipeline,
        operation: &'static str,
    ) -> MetricsResult<Vec<Document>> {
        run(self.store(), collection, pipeline, operation).await
    }

    pub(crate) async fn count(
        &self,
        collection: Collection,
        predicate: Predicate,
        operation: &'static str,
    ) -> MetricsResult<u64> {
        let pipeline = Pipeline::new().matching(predicate).count("count");
        let rows = self.run(collection, &pipeline, operation).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get_i64("count"))
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0))
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

/// Execute pipeline, logging it at debug level and tagging failures with `operation`
pub(crate) async fn run(
    store: &dyn DocumentStore,
    collection: Collection,
    pipeline: &Pipeline,
    operation: &'static str,
) -> MetricsResult<Vec<Document>> {
    debug!(
        operation,
        collection = %collection,
        pipeline = %pipeline.to_json(),
        "Running pipeline"
    );
    store.aggregate(collection, pipeline).await.map_err(|source| {
        error!(operation, collection = %collection, error = %source, "Store access failed");
        MetricsError::data_access(operation, source)
    })
}
