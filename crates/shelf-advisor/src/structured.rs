//! Structured completion
//!
//! The one call path every advisor flow shares:
//! - build prompt, call the provider under a deadline
//! - strip optional code-fence markers
//! - parse JSON into the expected type and validate it
//!
//! Any failure along the way is an [`AdvisorError`]; callers turn it into
//! their fallback with [`settle`].

use crate::error::{AdvisorError, AdvisorResult};
use crate::provider::{CompletionRequest, ProviderHandle};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Where a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Generated by the text provider
    Provider,
    /// Deterministic fallback
    Fallback,
}

/// Result of an AI-touching flow with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advice<T> {
    /// Result value
    pub value: T,
    /// Provenance
    pub source: Source,
}

impl<T> Advice<T> {
    /// Provider-generated value
    #[must_use]
    pub fn provider(value: T) -> Self {
        Self {
            value,
            source: Source::Provider,
        }
    }

    /// Fallback value
    #[must_use]
    pub fn fallback(value: T) -> Self {
        Self {
            value,
            source: Source::Fallback,
        }
    }

    /// Check if the fallback was used
    #[inline]
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == Source::Fallback
    }

    /// Transform the value, keeping provenance
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Advice<U> {
        Advice {
            value: f(self.value),
            source: self.source,
        }
    }
}

/// Remove a surrounding Markdown code fence, if any
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Completion text under a deadline
///
/// # Errors
/// `Unavailable`, `Timeout`, provider errors and `EmptyCompletion`
pub async fn complete_text(
    handle: &ProviderHandle,
    request: &CompletionRequest,
    timeout: Duration,
) -> AdvisorResult<String> {
    let provider = handle.provider()?;
    let text = tokio::time::timeout(timeout, provider.complete(request))
        .await
        .map_err(|_| AdvisorError::Timeout(timeout))??;
    let text = text.trim();
    if text.is_empty() {
        return Err(AdvisorError::EmptyCompletion);
    }
    Ok(text.to_string())
}

/// Typed, validated JSON completion under a deadline
///
/// # Errors
/// Everything [`complete_text`] returns, plus `InvalidJson` when the text is
/// not the expected type and whatever `validate` rejects
pub async fn complete_json<T, V>(
    handle: &ProviderHandle,
    request: &CompletionRequest,
    timeout: Duration,
    validate: V,
) -> AdvisorResult<T>
where
    T: DeserializeOwned,
    V: FnOnce(T) -> AdvisorResult<T>,
{
    let text = complete_text(handle, request, timeout).await?;
    let parsed = serde_json::from_str::<T>(strip_code_fences(&text))
        .map_err(|e| AdvisorError::InvalidJson(e.to_string()))?;
    validate(parsed)
}

/// Accept a provider result or log the failure and use the fallback
pub fn settle<T>(operation: &'static str, result: AdvisorResult<T>, fallback: impl FnOnce() -> T) -> Advice<T> {
    match result {
        Ok(value) => Advice::provider(value),
        Err(AdvisorError::Unavailable) => Advice::fallback(fallback()),
        Err(error) => {
            warn!(operation, error = %error, "Provider call failed, using fallback");
            Advice::fallback(fallback())
        }
    }
}
