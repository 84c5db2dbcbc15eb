//! Service-level errors
//!
//! Wraps metric and configuration errors and classifies them for the
//! transport layer: caller mistakes, missing documents and server failures.

use crate::config::ConfigError;
use shelf_metrics::MetricsError;

/// Errors surfaced by the service facades
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Metric computation failed
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// Configuration is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Request parameter outside its accepted range
    #[error("invalid {name}: {message}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// What was wrong
        message: String,
    },
}

impl ServiceError {
    /// Create parameter error
    pub fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    /// Check if the caller can fix the request
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Metrics(e) => e.is_client_error(),
            Self::InvalidParameter { .. } => true,
            Self::Config(_) => false,
        }
    }

    /// Check if a referenced document is missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Metrics(MetricsError::NotFound { .. }))
    }

    /// HTTP status code for this error
    #[must_use]
    pub fn http_status(&self) -> u16 {
        if self.is_not_found() {
            404
        } else if self.is_client_error() {
            400
        } else {
            500
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_store::StoreError;

    #[test]
    fn status_mapping() {
        let not_found = ServiceError::from(MetricsError::not_found("store", "64b7f0c2a1b2c3d4e5f60718"));
        assert_eq!(not_found.http_status(), 404);

        let bad_id = ServiceError::from(MetricsError::invalid_identifier("store_id", "xyz"));
        assert_eq!(bad_id.http_status(), 400);
        assert!(bad_id.is_client_error());

        let down = ServiceError::from(MetricsError::data_access(
            "total_revenue",
            StoreError::Unavailable("orders".into()),
        ));
        assert_eq!(down.http_status(), 500);

        assert_eq!(ServiceError::invalid_parameter("limit", "must be positive").http_status(), 400);
    }
}
