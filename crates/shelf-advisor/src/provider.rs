//! Text-completion capability
//!
//! The advisor never holds a nullable client. A missing provider is the
//! [`ProviderHandle::Unavailable`] variant and every flow handles it like any
//! other provider failure.

use crate::error::{AdvisorError, AdvisorResult};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// One completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instruction
    pub system: String,
    /// User prompt
    pub prompt: String,
    /// Output length bound
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Ask the provider to emit a JSON object
    pub json_mode: bool,
}

impl CompletionRequest {
    /// Create request with default bounds (256 tokens, temperature 0.2)
    #[must_use]
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens: 256,
            temperature: 0.2,
            json_mode: false,
        }
    }

    /// Set output length bound
    #[inline]
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Request JSON-object output
    #[inline]
    #[must_use]
    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Generative text provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Generate a completion
    ///
    /// # Errors
    /// Any transport, status or empty-response failure
    async fn complete(&self, request: &CompletionRequest) -> AdvisorResult<String>;
}

/// Configured provider, or its typed absence
#[derive(Clone, Default)]
pub enum ProviderHandle {
    /// No provider configured
    #[default]
    Unavailable,
    /// Provider ready for calls
    Available(Arc<dyn TextProvider>),
}

impl ProviderHandle {
    /// Wrap provider
    #[must_use]
    pub fn available(provider: impl TextProvider + 'static) -> Self {
        Self::Available(Arc::new(provider))
    }

    /// Check if a provider is configured
    #[inline]
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Provider, or `Unavailable`
    ///
    /// # Errors
    /// `AdvisorError::Unavailable` when no provider is configured
    pub fn provider(&self) -> AdvisorResult<&dyn TextProvider> {
        match self {
            Self::Available(provider) => Ok(provider.as_ref()),
            Self::Unavailable => Err(AdvisorError::Unavailable),
        }
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => f.write_str("Unavailable"),
            Self::Available(provider) => f.debug_tuple("Available").field(&provider.name()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let request = CompletionRequest::new("sys", "prompt")
            .with_max_tokens(150)
            .with_temperature(0.1)
            .json();
        assert_eq!(request.max_tokens, 150);
        assert!(request.json_mode);
    }

    #[test]
    fn unavailable_by_default() {
        let handle = ProviderHandle::default();
        assert!(!handle.is_available());
        assert!(handle.provider().is_err());
        assert_eq!(format!("{handle:?}"), "Unavailable");
    }

    #[tokio::test]
    async fn available_handle_delegates() {
        let mut mock = MockTextProvider::new();
        mock.expect_name().return_const("mock");
        mock.expect_complete()
            .times(1)
            .returning(|_| Ok("hello".to_string()));
        let handle = ProviderHandle::available(mock);

        let provider = handle.provider().unwrap();
        let text = provider
            .complete(&CompletionRequest::new("s", "p"))
            .await
            .unwrap();
        assert_eq!(text, "hello");
        assert_eq!(format!("{handle:?}"), "Available(\"mock\")");
    }
}
