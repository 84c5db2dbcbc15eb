//! Shelf Advisor - generative-text flows with deterministic fallbacks
//!
//! Every flow here tries a configured [`TextProvider`] first and, on any
//! failure, returns a deterministic result instead:
//! - NL-to-Filter Translator ([`Advisor::translate_filter`])
//! - substitute suggestions ([`Advisor::suggest_substitutes`])
//! - discount strategy ([`Advisor::recommend_discounts`])
//! - per-product stock advice ([`Advisor::recommend_stock_action`])
//! - query answers ([`Advisor::compose_answer`])
//!
//! Provider failures never reach the caller. Results carry a [`Source`] so
//! callers can tell generated output from fallbacks.
//!
//! # Example
//!
//! ```rust,ignore
//! use shelf_advisor::prelude::*;
//!
//! # async fn example() {
//! let advisor = Advisor::unavailable();
//! let translated = advisor.translate_filter("out of stock items").await;
//! assert_eq!(translated.filter, fallback_filter());
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod advisor;
pub mod answer;
pub mod discounts;
pub mod error;
pub mod openai;
mod prompts;
pub mod provider;
pub mod stock;
pub mod structured;
pub mod substitutes;
pub mod translator;

pub use advisor::{Advisor, DEFAULT_PROVIDER_TIMEOUT};
pub use answer::{fallback_answer, AnswerContext};
pub use discounts::{
    fallback_strategy, DiscountContext, DiscountStrategy, DiscountSuggestion, PerformanceSnapshot,
};
pub use error::{AdvisorError, AdvisorResult};
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use provider::{CompletionRequest, ProviderHandle, TextProvider};
pub use stock::{StockRecommendation, StockSnapshot};
pub use structured::{Advice, Source};
pub use substitutes::{fallback_substitutes, ProductBrief, Substitute};
pub use translator::{fallback_filter, TranslatedFilter};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for advisor flows
    pub use crate::{
        fallback_filter, Advice, Advisor, AdvisorError, AdvisorResult, CompletionRequest,
        ProviderHandle, Source, TextProvider,
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
