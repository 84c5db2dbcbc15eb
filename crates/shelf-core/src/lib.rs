//! Shelf Core - service layer over the metrics and advisor crates
//!
//! Wires the pieces a caller needs into two facades:
//! - [`AnalyticsService`]: one method per analytics operation, with
//!   parameter defaults and bounds from [`QueryDefaults`]
//! - [`AssistantService`]: query assistant, substitutes, discounts, stock
//!   alerts and quick analysis, each with a deterministic fallback
//!
//! Configuration comes from [`ShelfConfig`] (TOML file plus environment).
//! Errors are classified by [`ServiceError`] for the transport layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use shelf_core::prelude::*;
//!
//! # async fn example(store: std::sync::Arc<dyn shelf_store::DocumentStore>) -> ServiceResult<()> {
//! let config = ShelfConfig::load(None)?;
//! let analytics = AnalyticsService::new(store.clone(), config.queries);
//! let top = analytics
//!     .top_selling_products(&FilterParams::new("64b7f0c2a1b2c3d4e5f60718"), Some(5))
//!     .await?;
//!
//! let assistant = AssistantService::from_config(store, &config)?;
//! let answer = assistant.ask("64b7f0c2a1b2c3d4e5f60718", "products under 50").await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod assistant;
pub mod clock;
pub mod config;
pub mod error;
pub mod service;
pub mod telemetry;

pub use assistant::{
    AssistantService, DiscountReport, LowStockSubstitutes, OriginalProduct, QueryAnswer,
    QuickAnalysis, StockAlert, StockAlerts, SubstituteReport,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, ConfigResult, ProviderConfig, ProviderSettings, QueryDefaults, ShelfConfig};
pub use error::{ServiceError, ServiceResult};
pub use service::{AnalyticsService, MetricKind, MetricValue};

pub use shelf_metrics::{FilterParams, RecentOrdersQuery};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running shelf services
    pub use crate::{
        AnalyticsService, AssistantService, FilterParams, MetricKind, RecentOrdersQuery,
        ServiceError, ServiceResult, ShelfConfig,
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
