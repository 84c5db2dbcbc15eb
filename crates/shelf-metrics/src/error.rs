//! Error types for metric computation
//!
//! Provides error handling for:
//! - Caller input (identifiers, dates, pagination)
//! - Store access failures, tagged with the operation name
//! - Result rows that do not have the expected shape

use shelf_store::StoreError;

/// Metric computation errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Store, category or product identifier could not be parsed
    #[error("invalid {field}: '{value}'")]
    InvalidIdentifier {
        /// Parameter name
        field: &'static str,
        /// Rejected text
        value: String,
    },

    /// Date parameter could not be parsed
    #[error("invalid date format for {field}: '{value}'")]
    InvalidDateFormat {
        /// Parameter name
        field: &'static str,
        /// Rejected text
        value: String,
    },

    /// Page or limit was not positive
    #[error("invalid pagination: page={page}, limit={limit}")]
    InvalidPagination {
        /// Requested page
        page: i64,
        /// Requested page size
        limit: i64,
    },

    /// Store access failed
    #[error("data access failed in {operation}: {source}")]
    DataAccess {
        /// Operation being computed
        operation: &'static str,
        /// Underlying store error
        #[source]
        source: StoreError,
    },

    /// Result row did not have the expected shape
    #[error("malformed result in {operation}: {message}")]
    MalformedResult {
        /// Operation being computed
        operation: &'static str,
        /// Shape violation
        message: String,
    },

    /// Referenced document does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind ("store", "product")
        entity: &'static str,
        /// Requested identifier
        id: String,
    },
}

impl MetricsError {
    /// Create invalid identifier error
    pub fn invalid_identifier(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            field,
            value: value.into(),
        }
    }

    /// Create invalid date error
    pub fn invalid_date(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidDateFormat {
            field,
            value: value.into(),
        }
    }

    /// Create malformed result error
    pub fn malformed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::MalformedResult {
            operation,
            message: message.into(),
        }
    }

    /// Create not-found error
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Wrap a store error for operation
    pub fn data_access(operation: &'static str, source: StoreError) -> Self {
        Self::DataAccess { operation, source }
    }

    /// Check if error was caused by caller input
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier { .. }
                | Self::InvalidDateFormat { .. }
                | Self::InvalidPagination { .. }
                | Self::NotFound { .. }
        )
    }
}

/// Result type alias for metric operations
pub type MetricsResult<T> = Result<T, MetricsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = MetricsError::invalid_identifier("store_id", "abc");
        assert_eq!(err.to_string(), "invalid store_id: 'abc'");

        let err = MetricsError::InvalidPagination { page: 0, limit: 10 };
        assert_eq!(err.to_string(), "invalid pagination: page=0, limit=10");
    }

    #[test]
    fn classification() {
        assert!(MetricsError::invalid_date("date_from", "x").is_client_error());
        assert!(MetricsError::not_found("store", "1").is_client_error());
        let access = MetricsError::data_access("total_revenue", StoreError::Backend("down".into()));
        assert!(!access.is_client_error());
        assert!(access.to_string().contains("total_revenue"));
    }
}
