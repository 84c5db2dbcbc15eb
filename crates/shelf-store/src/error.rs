//! Error types for the document store layer
//!
//! Provides error handling for:
//! - Identifier parsing (ObjectId)
//! - Extended JSON import
//! - Pipeline compilation and evaluation
//! - Backend access failures

/// Invalid ObjectId text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid object id '{0}': expected 24 hex characters")]
pub struct ObjectIdError(pub String);

/// Document store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Backend rejected or failed the operation
    #[error("backend error: {0}")]
    Backend(String),

    /// Expression could not be evaluated against a document
    #[error("expression error in {stage}: {message}")]
    Expression {
        /// Stage being evaluated
        stage: &'static str,
        /// Failure detail
        message: String,
    },

    /// Filter document could not be compiled into a predicate
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Extended JSON could not be converted
    #[error("extended json error: {0}")]
    ExtendedJson(String),

    /// Identifier parsing error
    #[error(transparent)]
    ObjectId(#[from] ObjectIdError),
}

impl StoreError {
    /// Create expression error for stage
    pub fn expression(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Expression {
            stage,
            message: message.into(),
        }
    }

    /// Check if error originates from the backend rather than the pipeline
    #[inline]
    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Backend(_))
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_error_display() {
        let err = ObjectIdError("xyz".to_string());
        assert_eq!(
            err.to_string(),
            "invalid object id 'xyz': expected 24 hex characters"
        );
    }

    #[test]
    fn backend_classification() {
        assert!(StoreError::Unavailable("down".into()).is_backend());
        assert!(!StoreError::expression("$group", "bad").is_backend());
    }
}
