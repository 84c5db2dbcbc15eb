//! NL-to-Filter Translator
//!
//! Maps a free-text question to a product filter. The provider is asked for
//! a JSON object; the object must compile into a [`Predicate`] to count as a
//! translation. Anything else yields [`fallback_filter`] for that call.

use crate::advisor::Advisor;
use crate::error::{AdvisorError, AdvisorResult};
use crate::prompts;
use crate::provider::CompletionRequest;
use crate::structured::{complete_json, settle, Source};
use serde_json::{json, Map, Value as Json};
use shelf_store::{ObjectId, Predicate, Value};
use tracing::info;

/// Field holding the owning store on products
pub const STORE_FIELD: &str = "seller";

/// Filter used whenever translation fails
#[must_use]
pub fn fallback_filter() -> Json {
    json!({ "status": "APPROVED", "stage": "ACTIVATE" })
}

/// A translated filter and its compiled predicate
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedFilter {
    /// Filter as returned by the provider, or the fallback
    pub filter: Json,
    /// Compiled form of `filter`
    pub predicate: Predicate,
    /// Provenance
    pub source: Source,
}

impl TranslatedFilter {
    fn fallback() -> Self {
        let filter = fallback_filter();
        let predicate = Predicate::and([
            Predicate::eq("status", "APPROVED"),
            Predicate::eq("stage", "ACTIVATE"),
        ]);
        Self {
            filter,
            predicate,
            source: Source::Fallback,
        }
    }

    /// Restrict to one store
    ///
    /// Any store condition the provider produced is discarded; the resolved
    /// store identifier always wins.
    #[must_use]
    pub fn scoped_to(self, store_id: ObjectId) -> Predicate {
        let mut filter = self.filter;
        let removed = filter
            .as_object_mut()
            .and_then(|map| map.remove(STORE_FIELD))
            .is_some();
        let predicate = if removed {
            Predicate::from_json(&filter).unwrap_or(self.predicate)
        } else {
            self.predicate
        };
        predicate.and_also(Predicate::eq(STORE_FIELD, Value::ObjectId(store_id)))
    }
}

fn compile(value: Json) -> AdvisorResult<(Json, Predicate)> {
    let Json::Object(map) = value else {
        return Err(AdvisorError::shape("filter must be a JSON object"));
    };
    let filter = Json::Object(map);
    let predicate = Predicate::from_json(&filter).map_err(|e| AdvisorError::shape(e.to_string()))?;
    Ok((filter, predicate))
}

impl Advisor {
    /// Translate a free-text question into a product filter
    ///
    /// Never fails; provider errors, timeouts, non-JSON output and filters
    /// that do not compile all produce the fallback filter.
    pub async fn translate_filter(&self, question: &str) -> TranslatedFilter {
        let request = CompletionRequest::new(prompts::FILTER_SYSTEM, prompts::filter_prompt(question))
            .with_max_tokens(150)
            .with_temperature(0.1);

        let result = complete_json::<Map<String, Json>, _>(&self.provider, &request, self.timeout, Ok)
            .await
            .and_then(|map| compile(Json::Object(map)));

        let advice = settle("translate_filter", result, || {
            let fallback = TranslatedFilter::fallback();
            (fallback.filter, fallback.predicate)
        });
        if !advice.is_fallback() {
            info!(question, filter = %advice.value.0, "Translated query to filter");
        }
        TranslatedFilter {
            filter: advice.value.0,
            predicate: advice.value.1,
            source: advice.source,
        }
    }
}
