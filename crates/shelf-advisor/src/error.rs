//! Error types for text-provider calls
//!
//! None of these reach the callers of the advisor flows: every flow catches
//! them, logs them and substitutes its deterministic fallback.

use std::time::Duration;

/// Text-provider and structured-completion errors
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    /// No provider configured
    #[error("text provider unavailable")]
    Unavailable,

    /// Provider did not answer within the deadline
    #[error("text provider timed out after {0:?}")]
    Timeout(Duration),

    /// Request could not be sent or the response could not be read
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider answered with a non-success status
    #[error("provider returned {status}: {message}")]
    Provider {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Provider returned no completion text
    #[error("provider returned an empty completion")]
    EmptyCompletion,

    /// Completion was not valid JSON
    #[error("completion is not valid JSON: {0}")]
    InvalidJson(String),

    /// Completion parsed but has the wrong shape
    #[error("completion has unexpected shape: {0}")]
    InvalidShape(String),
}

impl AdvisorError {
    /// Create shape error
    pub fn shape(message: impl Into<String>) -> Self {
        Self::InvalidShape(message.into())
    }

    /// Check if the provider was never reached
    #[inline]
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl From<reqwest::Error> for AdvisorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Result type alias for provider calls
pub type AdvisorResult<T> = Result<T, AdvisorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = AdvisorError::Provider {
            status: 429,
            message: "rate limited".into(),
        };
        assert_eq!(err.to_string(), "provider returned 429: rate limited");
        assert!(AdvisorError::Unavailable.is_unavailable());
        assert!(!AdvisorError::shape("x").is_unavailable());
    }
}
