//! Advisor: the AI-touching flows bound to one provider handle

use crate::provider::ProviderHandle;
use std::time::Duration;

/// Default deadline for one provider call
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(20);

/// Text-provider flows with deterministic fallbacks
///
/// Holds no per-call state. Every method tries the provider first and falls
/// back for that call only, so a transient outage never sticks.
#[derive(Debug, Clone)]
pub struct Advisor {
    pub(crate) provider: ProviderHandle,
    pub(crate) timeout: Duration,
}

impl Advisor {
    /// Create advisor over provider handle
    #[must_use]
    pub fn new(provider: ProviderHandle) -> Self {
        Self {
            provider,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Advisor that always uses fallbacks
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(ProviderHandle::Unavailable)
    }

    /// Set provider call deadline
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Provider deadline
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check if a provider is configured
    #[inline]
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.provider.is_available()
    }
}

impl Default for Advisor {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// Round to two decimal places
#[inline]
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
